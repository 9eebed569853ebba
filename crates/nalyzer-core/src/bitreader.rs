//! 比特流读取器.
//!
//! 提供从 RBSP 字节缓冲区中按位读取数据的能力, 是所有 NAL 语法解析的基础设施.
//!
//! 按大端位序读取 (MSB first). 所有读取操作在失败时不移动游标,
//! 调用方可以在数据耗尽后继续查询当前位置.

use crate::error::MAX_GOLOMB_LEADING_ZEROS;
use crate::{NalError, NalResult};

/// 比特流读取器
///
/// 从字节缓冲区中按位读取数据, 使用大端位序 (MSB first).
///
/// # 示例
/// ```
/// use nalyzer_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 获取已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.bits_left() == 0
    }

    /// 当前是否位于字节边界
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_pos == 0
    }

    fn out_of_data(&self, requested: usize) -> NalError {
        NalError::OutOfData {
            requested,
            available: self.bits_left(),
        }
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> NalResult<u32> {
        if self.byte_pos >= self.data.len() {
            return Err(self.out_of_data(1));
        }

        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Ok(u32::from(bit))
    }

    /// 读取 1 个位并解释为布尔值
    pub fn read_flag(&mut self) -> NalResult<bool> {
        Ok(self.read_bit()? == 1)
    }

    /// 读取 N 个位 (最多 32 位)
    ///
    /// 按大端位序读取, 返回值的低 N 位有效. 剩余位数不足时返回
    /// [`NalError::OutOfData`], 游标保持不变.
    pub fn read_bits(&mut self, n: u32) -> NalResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(NalError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(self.out_of_data(n as usize));
        }

        let mut result: u32 = 0;
        let mut remaining = n;

        while remaining > 0 {
            let available = 8 - self.bit_pos as u32;
            let to_read = remaining.min(available);

            // 从当前字节中提取位
            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;

            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= to_read;
        }

        Ok(result)
    }

    /// 读取 N 个位 (最多 64 位)
    pub fn read_bits_u64(&mut self, n: u32) -> NalResult<u64> {
        if n <= 32 {
            return self.read_bits(n).map(u64::from);
        }
        if n > 64 {
            return Err(NalError::InvalidArgument(format!(
                "read_bits_u64: n={} 超过 64 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(self.out_of_data(n as usize));
        }

        let high_bits = n - 32;
        let high = self.read_bits(high_bits)? as u64;
        let low = self.read_bits(32)? as u64;
        Ok((high << 32) | low)
    }

    /// 读取无符号 Exp-Golomb 码 ue(v)
    ///
    /// 前导零超过 31 位时返回 [`NalError::MalformedCode`]. 失败时游标保持不变.
    pub fn read_ue(&mut self) -> NalResult<u32> {
        let saved = (self.byte_pos, self.bit_pos);
        let result = self.read_ue_unchecked();
        if result.is_err() {
            (self.byte_pos, self.bit_pos) = saved;
        }
        result
    }

    fn read_ue_unchecked(&mut self) -> NalResult<u32> {
        let mut leading_zeros = 0u32;
        while self.read_bit()? == 0 {
            leading_zeros += 1;
            if leading_zeros > MAX_GOLOMB_LEADING_ZEROS {
                return Err(NalError::MalformedCode { leading_zeros });
            }
        }
        if leading_zeros == 0 {
            return Ok(0);
        }
        let suffix = self.read_bits(leading_zeros)?;
        // 31 个前导零时最大值为 2^32 - 2, 仍在 u32 范围内
        Ok(((1u64 << leading_zeros) - 1 + u64::from(suffix)) as u32)
    }

    /// 读取有符号 Exp-Golomb 码 se(v)
    ///
    /// 码值 k 映射为 (-1)^(k+1) * Ceil(k / 2).
    pub fn read_se(&mut self) -> NalResult<i32> {
        let code = self.read_ue()?;
        let magnitude = code.div_ceil(2) as i32;
        if code & 1 == 1 {
            Ok(magnitude)
        } else {
            Ok(-magnitude)
        }
    }

    /// 窥视 N 个位 (不移动位置)
    pub fn peek_bits(&self, n: u32) -> NalResult<u32> {
        self.clone().read_bits(n)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: usize) -> NalResult<()> {
        if n > self.bits_left() {
            return Err(self.out_of_data(n));
        }

        let total_bits = self.bit_pos as usize + n;
        self.byte_pos += total_bits / 8;
        self.bit_pos = (total_bits % 8) as u8;

        Ok(())
    }

    /// 对齐到下一个字节边界, 返回跳过的位数
    ///
    /// 如果当前已在字节边界, 则不做任何事并返回 0.
    pub fn align_to_byte(&mut self) -> u32 {
        if self.bit_pos == 0 {
            return 0;
        }
        let skipped = 8 - u32::from(self.bit_pos);
        self.bit_pos = 0;
        self.byte_pos += 1;
        skipped
    }

    /// 当前位置之后是否还有 RBSP 数据 (即尚未到达 rbsp_stop_one_bit)
    ///
    /// 停止位定义为缓冲区中最后一个值为 1 的位. 缓冲区全零时返回 false.
    pub fn more_rbsp_data(&self) -> bool {
        let Some(last) = self.data.iter().rposition(|&b| b != 0) else {
            return false;
        };
        let stop_bit = last * 8 + 7 - self.data[last].trailing_zeros() as usize;
        self.bits_read() < stop_bit
    }

    /// 获取当前字节位置
    pub fn byte_position(&self) -> usize {
        self.byte_pos
    }

    /// 从当前位置读取原始字节切片
    ///
    /// 仅在字节对齐时可用.
    pub fn read_bytes(&mut self, n: usize) -> NalResult<&'a [u8]> {
        if self.bit_pos != 0 {
            return Err(NalError::InvalidArgument("read_bytes 需要字节对齐".into()));
        }

        let end = self.byte_pos + n;
        if end > self.data.len() {
            return Err(self.out_of_data(n * 8));
        }

        let slice = &self.data[self.byte_pos..end];
        self.byte_pos = end;
        Ok(slice)
    }

    /// 获取底层数据的引用
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitwriter::BitWriter;

    #[test]
    fn test_read_bits_basic() {
        let data = [0b10110001, 0b01010101];
        let mut br = BitReader::new(&data);

        assert_eq!(br.read_bits(1).unwrap(), 1);
        assert_eq!(br.read_bits(1).unwrap(), 0);
        assert_eq!(br.read_bits(2).unwrap(), 0b11);
        assert_eq!(br.read_bits(4).unwrap(), 0b0001);
        assert_eq!(br.read_bits(8).unwrap(), 0b01010101);

        assert!(br.is_eof());
    }

    #[test]
    fn test_read_bits_32_bit() {
        let data = [0xFF, 0x00, 0xFF, 0x00];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(32).unwrap(), 0xFF00FF00);
    }

    #[test]
    fn test_read_bits_32_bit_unaligned() {
        let data = [0x0F, 0xFF, 0xFF, 0xFF, 0xF0];
        let mut br = BitReader::new(&data);
        br.skip_bits(4).unwrap();
        assert_eq!(br.read_bits(32).unwrap(), 0xFFFF_FFFF);
        assert_eq!(br.bits_left(), 4);
    }

    #[test]
    fn test_read_bits_every_width() {
        // 对 0..=32 的每个宽度, 结果都应等于逐位拼接的值
        let data: Vec<u8> = (0..16u8).map(|i| i.wrapping_mul(37) ^ 0xA5).collect();
        for offset in 0..8usize {
            for n in 0..=32u32 {
                let mut expected = 0u64;
                for i in 0..n as usize {
                    let pos = offset + i;
                    let bit = (data[pos / 8] >> (7 - pos % 8)) & 1;
                    expected = (expected << 1) | u64::from(bit);
                }
                let mut br = BitReader::new(&data);
                br.skip_bits(offset).unwrap();
                assert_eq!(u64::from(br.read_bits(n).unwrap()), expected);
                assert_eq!(br.bits_read(), offset + n as usize);
            }
        }
    }

    #[test]
    fn test_read_past_end_keeps_cursor() {
        let data = [0xAB];
        let mut br = BitReader::new(&data);
        br.read_bits(3).unwrap();

        let err = br.read_bits(6).unwrap_err();
        assert_eq!(
            err,
            NalError::OutOfData {
                requested: 6,
                available: 5
            }
        );
        assert_eq!(br.bits_read(), 3);
        assert_eq!(br.read_bits(5).unwrap(), 0b01011);
        assert!(br.read_bit().unwrap_err().is_out_of_data());
    }

    #[test]
    fn test_read_bits_u64() {
        let data = [0xFF, 0x00, 0xFF, 0x00, 0xAA, 0xBB, 0xCC, 0xDD];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits_u64(64).unwrap(), 0xFF00FF00AABBCCDD);
    }

    #[test]
    fn test_read_bits_u64_short_buffer_keeps_cursor() {
        let data = [0xFF; 5];
        let mut br = BitReader::new(&data);
        assert!(br.read_bits_u64(43).is_err());
        assert_eq!(br.bits_read(), 0);
    }

    #[test]
    fn test_read_ue_known_codes() {
        // 1 | 010 | 011 | 00100 | 00111 -> 0, 1, 2, 3, 6
        let data = [0b10100110, 0b01000011, 0b10000000];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_ue().unwrap(), 0);
        assert_eq!(br.read_ue().unwrap(), 1);
        assert_eq!(br.read_ue().unwrap(), 2);
        assert_eq!(br.read_ue().unwrap(), 3);
        assert_eq!(br.read_ue().unwrap(), 6);
    }

    #[test]
    fn test_read_se_mapping() {
        let mut bw = BitWriter::new();
        for k in 0..7 {
            bw.write_ue(k);
        }
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        let values: Vec<i32> = (0..7).map(|_| br.read_se().unwrap()).collect();
        assert_eq!(values, vec![0, 1, -1, 2, -2, 3, -3]);
    }

    #[test]
    fn test_exp_golomb_round_trip() {
        let mut bw = BitWriter::new();
        for v in 0..(1u32 << 20) {
            bw.write_ue(v);
        }
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        for v in 0..(1u32 << 20) {
            assert_eq!(br.read_ue().unwrap(), v);
        }
    }

    #[test]
    fn test_signed_exp_golomb_round_trip() {
        let mut bw = BitWriter::new();
        for v in -4096..=4096 {
            bw.write_se(v);
        }
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        for v in -4096..=4096 {
            assert_eq!(br.read_se().unwrap(), v);
        }
    }

    #[test]
    fn test_read_ue_extreme_values() {
        let mut bw = BitWriter::new();
        bw.write_ue(u32::MAX - 1);
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_ue().unwrap(), u32::MAX - 1);
    }

    #[test]
    fn test_read_ue_malformed() {
        // 40 个 0 后才出现 1
        let data = [0, 0, 0, 0, 0, 0x80, 0xFF];
        let mut br = BitReader::new(&data);
        let err = br.read_ue().unwrap_err();
        assert!(matches!(err, NalError::MalformedCode { leading_zeros: 32 }));
        assert_eq!(br.bits_read(), 0);
    }

    #[test]
    fn test_read_ue_truncated_keeps_cursor() {
        // 00001 后缺少 4 位后缀
        let data = [0b00001010];
        let mut br = BitReader::new(&data);
        assert!(br.read_ue().unwrap_err().is_out_of_data());
        assert_eq!(br.bits_read(), 0);
    }

    #[test]
    fn test_peek_bits() {
        let data = [0b10110001];
        let mut br = BitReader::new(&data);

        assert_eq!(br.peek_bits(4).unwrap(), 0b1011);
        assert_eq!(br.peek_bits(4).unwrap(), 0b1011); // 不移动
        assert_eq!(br.read_bits(4).unwrap(), 0b1011);
        assert_eq!(br.peek_bits(4).unwrap(), 0b0001);
    }

    #[test]
    fn test_skip_bits() {
        let data = [0b10110001, 0b01010101];
        let mut br = BitReader::new(&data);

        br.skip_bits(4).unwrap();
        assert_eq!(br.read_bits(4).unwrap(), 0b0001);
        br.skip_bits(4).unwrap();
        assert_eq!(br.read_bits(4).unwrap(), 0b0101);
        assert!(br.skip_bits(1).is_err());
    }

    #[test]
    fn test_align_to_byte_idempotent() {
        let data = [0b10110001, 0b01010101];
        let mut br = BitReader::new(&data);

        br.read_bits(3).unwrap();
        assert_eq!(br.align_to_byte(), 5);
        assert_eq!(br.align_to_byte(), 0);
        assert!(br.is_byte_aligned());
        assert_eq!(br.byte_position(), 1);
        assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
    }

    #[test]
    fn test_more_rbsp_data() {
        // 3 位数据 + 停止位 + 4 位对齐零
        let data = [0b1011_0000];
        let mut br = BitReader::new(&data);
        assert!(br.more_rbsp_data());
        br.read_bits(2).unwrap();
        assert!(br.more_rbsp_data());
        br.read_bits(1).unwrap();
        assert!(!br.more_rbsp_data());

        let trailing_zero_bytes = [0x80, 0x00, 0x00];
        assert!(!BitReader::new(&trailing_zero_bytes).more_rbsp_data());
        assert!(!BitReader::new(&[0u8; 4]).more_rbsp_data());
    }

    #[test]
    fn test_bits_left() {
        let data = [0x00, 0x00];
        let mut br = BitReader::new(&data);

        assert_eq!(br.bits_left(), 16);
        br.read_bits(5).unwrap();
        assert_eq!(br.bits_left(), 11);
        br.read_bits(11).unwrap();
        assert_eq!(br.bits_left(), 0);
        assert!(br.is_eof());
    }

    #[test]
    fn test_read_bytes() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut br = BitReader::new(&data);

        let bytes = br.read_bytes(2).unwrap();
        assert_eq!(bytes, &[0x01, 0x02]);
        let bytes = br.read_bytes(2).unwrap();
        assert_eq!(bytes, &[0x03, 0x04]);
        assert!(br.read_bytes(1).is_err());
    }
}
