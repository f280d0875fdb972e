/*
    Disk2Emu

    Copyright 2025 The Disk2Emu Authors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    codec::mod.rs

    6-and-2 group code recording used by 16-sector 5.25" media.
*/

pub mod field;
pub mod gcr;

pub use field::{
    decode_data_field,
    encode_data_field,
    sector_checksum,
    AddressField,
    DataFieldDecoder,
    DataFieldEncoder,
    ADDRESS_EPILOGUE,
    ADDRESS_PROLOGUE,
    DATA_EPILOGUE,
    DATA_FIELD_LEN,
    DATA_PROLOGUE,
    HEADER_STREAM_LEN,
    SYNC_BYTE,
};
pub use gcr::{
    decode,
    encode,
    odd_even_decode,
    odd_even_encode,
    postnibblize,
    prenibblize,
    untranslate,
    Nibblized,
    PRIMARY_LEN,
    SECONDARY_LEN,
    SYMBOL_COUNT,
    TRANSLATE,
};
