use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rgecore::data::bank::{Column, Primitive};

/// Compression level used for bank payloads.
pub const ZSTD_LEVEL: i32 = 3;

/// Decompress a zstd payload.
pub fn zstd_decompress(compressed: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = zstd::Decoder::new(compressed)?;
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;
    Ok(data)
}

/// Compress a byte array with zstd.
///
/// # Arguments
///
/// * `data` - bytes to compress
/// * `level` - zstd compression level
///
pub fn zstd_compress(data: &[u8], level: i32) -> io::Result<Vec<u8>> {
    let mut encoder = zstd::Encoder::new(Vec::new(), level)?;
    encoder.write_all(data)?;
    encoder.finish()
}

/// Append the values of `column` to `out`, little endian.
pub fn write_column(out: &mut Vec<u8>, column: &Column) -> io::Result<()> {
    match column {
        Column::Byte(values) => values.iter().try_for_each(|v| out.write_i8(*v)),
        Column::Short(values) => values.iter().try_for_each(|v| out.write_i16::<LittleEndian>(*v)),
        Column::Int(values) => values.iter().try_for_each(|v| out.write_i32::<LittleEndian>(*v)),
        Column::Float(values) => values.iter().try_for_each(|v| out.write_f32::<LittleEndian>(*v)),
    }
}

/// Read `nrows` values of type `primitive` from `cursor`.
pub fn read_column(cursor: &mut Cursor<&[u8]>, primitive: Primitive, nrows: usize) -> io::Result<Column> {
    let column = match primitive {
        Primitive::Byte => Column::Byte((0..nrows).map(|_| cursor.read_i8()).collect::<io::Result<_>>()?),
        Primitive::Short => {
            Column::Short((0..nrows).map(|_| cursor.read_i16::<LittleEndian>()).collect::<io::Result<_>>()?)
        }
        Primitive::Int => {
            Column::Int((0..nrows).map(|_| cursor.read_i32::<LittleEndian>()).collect::<io::Result<_>>()?)
        }
        Primitive::Float => {
            Column::Float((0..nrows).map(|_| cursor.read_f32::<LittleEndian>()).collect::<io::Result<_>>()?)
        }
    };
    Ok(column)
}

/// Bytes taken by one row of a bank with the given column types.
pub fn row_width(primitives: &[Primitive]) -> usize {
    primitives.iter().map(|p| p.width()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zstd_round_trip() {
        let data: Vec<u8> = (0..2048u32).flat_map(|v| v.to_le_bytes()).collect();
        let compressed = zstd_compress(&data, ZSTD_LEVEL).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(zstd_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_columns_are_little_endian() {
        let mut out = Vec::new();
        write_column(&mut out, &Column::Short(vec![1, -2])).unwrap();
        write_column(&mut out, &Column::Float(vec![1.5])).unwrap();
        assert_eq!(&out[..4], &[1, 0, 0xfe, 0xff]);
        assert_eq!(out.len(), row_width(&[Primitive::Short]) * 2 + 4);

        let mut cursor = Cursor::new(out.as_slice());
        assert_eq!(read_column(&mut cursor, Primitive::Short, 2).unwrap(), Column::Short(vec![1, -2]));
        assert_eq!(read_column(&mut cursor, Primitive::Float, 1).unwrap(), Column::Float(vec![1.5]));
        assert!(read_column(&mut cursor, Primitive::Int, 1).is_err());
    }
}
