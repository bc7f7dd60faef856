// crates/dinfox-rs/src/uplink/bits.rs
//! Big-endian, MSB-first bit packing of uplink records.

use crate::hal::DinfoxError;

/// Writes fields of arbitrary width (up to 32 bits) into a byte buffer.
///
/// Values are masked to their field width.
pub struct BitWriter<'a> {
    buffer: &'a mut [u8],
    bit_position: usize,
}

impl<'a> BitWriter<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        buffer.fill(0);
        Self {
            buffer,
            bit_position: 0,
        }
    }

    pub fn write(&mut self, value: u32, width: u8) -> Result<(), DinfoxError> {
        if width > 32 {
            return Err(DinfoxError::InvalidAddress);
        }
        if self.bit_position + width as usize > self.buffer.len() * 8 {
            return Err(DinfoxError::BufferOverflow);
        }
        for bit in (0..width).rev() {
            if (value >> bit) & 1 != 0 {
                let byte = self.bit_position / 8;
                self.buffer[byte] |= 0x80 >> (self.bit_position % 8);
            }
            self.bit_position += 1;
        }
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), DinfoxError> {
        self.write(value as u32, 1)
    }

    pub fn bits_written(&self) -> usize {
        self.bit_position
    }

    /// Bytes touched so far, last partial byte included.
    pub fn len(&self) -> usize {
        self.bit_position.div_ceil(8)
    }

    pub fn is_empty(&self) -> bool {
        self.bit_position == 0
    }
}

/// Reads fields written by [`BitWriter`].
pub struct BitReader<'a> {
    buffer: &'a [u8],
    bit_position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            bit_position: 0,
        }
    }

    pub fn read(&mut self, width: u8) -> Result<u32, DinfoxError> {
        if width > 32 {
            return Err(DinfoxError::InvalidAddress);
        }
        if self.bit_position + width as usize > self.buffer.len() * 8 {
            return Err(DinfoxError::ParseError);
        }
        let mut value: u32 = 0;
        for _ in 0..width {
            let byte = self.buffer[self.bit_position / 8];
            let bit = (byte >> (7 - self.bit_position % 8)) & 1;
            value = (value << 1) | bit as u32;
            self.bit_position += 1;
        }
        Ok(value)
    }

    pub fn read_bool(&mut self) -> Result<bool, DinfoxError> {
        Ok(self.read(1)? != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_packed_msb_first() {
        let mut buffer = [0xFFu8; 3];
        let mut writer = BitWriter::new(&mut buffer);
        writer.write(0x0D, 4).unwrap();
        writer.write(0x1, 1).unwrap();
        writer.write(0x3FFFF, 17).unwrap();
        assert_eq!(writer.bits_written(), 22);
        assert_eq!(writer.len(), 3);
        assert_eq!(buffer, [0xDF, 0xFF, 0xFC]);
    }

    #[test]
    fn test_values_are_masked_to_width() {
        let mut buffer = [0u8; 1];
        let mut writer = BitWriter::new(&mut buffer);
        writer.write(0x1F3, 4).unwrap();
        assert_eq!(buffer, [0x30]);
    }

    #[test]
    fn test_writer_overflow() {
        let mut buffer = [0u8; 1];
        let mut writer = BitWriter::new(&mut buffer);
        writer.write(0, 7).unwrap();
        assert_eq!(writer.write(0, 2), Err(DinfoxError::BufferOverflow));
    }

    #[test]
    fn test_reader_recovers_fields() {
        let buffer = [0xAB, 0xCD, 0xE0];
        let mut reader = BitReader::new(&buffer);
        assert_eq!(reader.read(4).unwrap(), 0xA);
        assert_eq!(reader.read(12).unwrap(), 0xBCD);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read(8), Err(DinfoxError::ParseError));
    }
}
