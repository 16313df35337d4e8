//! 指令校验和
//!
//! 机器人端使用按 32 位字处理的 CRC-32（多项式 `0x04C11DB7`，初值 `0xFFFFFFFF`，
//! 不反射、不取反），输入为小端读取的 `u32` 字序列。

/// CRC-32 多项式
pub const CRC32_POLY: u32 = 0x04C1_1DB7;

/// 按字计算 CRC-32
///
/// 每个字从最高位开始逐位移入寄存器，结果不做最终异或。
pub fn crc32_core(words: &[u32]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;

    for &word in words {
        let mut bit: u32 = 1 << 31;
        for _ in 0..32 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ CRC32_POLY;
            } else {
                crc <<= 1;
            }
            if word & bit != 0 {
                crc ^= CRC32_POLY;
            }
            bit >>= 1;
        }
    }

    crc
}

/// 对字节切片计算 CRC（按小端 `u32` 分组，尾部不足 4 字节的部分被忽略）
pub fn crc32_bytes(data: &[u8]) -> u32 {
    let words: Vec<u32> = data
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    crc32_core(&words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_empty_is_initial_value() {
        assert_eq!(crc32_core(&[]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_crc32_deterministic() {
        let words = [0x1234_5678, 0x9ABC_DEF0, 0];
        assert_eq!(crc32_core(&words), crc32_core(&words));
        assert_ne!(crc32_core(&words), crc32_core(&words[..2]));
    }

    #[test]
    fn test_crc32_bytes_matches_words() {
        let bytes = [0x78, 0x56, 0x34, 0x12, 0xF0, 0xDE, 0xBC, 0x9A, 0xAA];
        assert_eq!(crc32_bytes(&bytes), crc32_core(&[0x1234_5678, 0x9ABC_DEF0]));
    }

    #[test]
    fn test_crc32_single_bit_sensitivity() {
        assert_ne!(crc32_core(&[0]), crc32_core(&[1]));
        assert_ne!(crc32_core(&[0x8000_0000]), crc32_core(&[0]));
    }
}
