//! Disk II セクタエンコーダ
//!
//! 256バイトの論理セクタを、ドライブのヘッドが読み取るニブル列
//! （同期バイト、アドレスフィールド、6-and-2データフィールド）に変換する。
//! 逆変換（デコード）も提供する。
//!
//! Based on "Beneath Apple DOS" chapter 3

use std::fmt;

/// ディスクの定数
pub const TRACKS: usize = 35;
pub const SECTORS_PER_TRACK: usize = 16;
pub const BYTES_PER_SECTOR: usize = 256;
pub const BYTES_PER_TRACK: usize = SECTORS_PER_TRACK * BYTES_PER_SECTOR;
pub const DSK_SIZE: usize = TRACKS * BYTES_PER_TRACK; // 143360 bytes

/// デフォルトのボリューム番号
pub const DEFAULT_VOLUME: u8 = 0xFE;

/// 同期バイト
pub const SYNC_BYTE: u8 = 0xFF;
pub const GAP1_LEN: usize = 16;
pub const GAP2_LEN: usize = 8;
pub const GAP3_LEN: usize = 16;

pub const ADDRESS_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0x96];
pub const DATA_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0xAD];
pub const EPILOGUE: [u8; 3] = [0xDE, 0xAA, 0xEB];

/// 6-and-2エンコード後のデータ長（チェックサムを除く）
pub const USER_DATA_LEN: usize = 342;

/// 補助バッファ（下位2ビット）の長さ
const AUX_LEN: usize = 0x56;

/// エンコード済みセクタ全体の長さ
pub const RAW_SECTOR_LEN: usize = GAP1_LEN
    + ADDRESS_PROLOGUE.len()
    + 8
    + EPILOGUE.len()
    + GAP2_LEN
    + DATA_PROLOGUE.len()
    + USER_DATA_LEN
    + 1
    + EPILOGUE.len()
    + GAP3_LEN;

/// 6-and-2エンコーディングテーブル
pub const WRITE_TABLE: [u8; 64] = [
    0x96, 0x97, 0x9A, 0x9B, 0x9D, 0x9E, 0x9F, 0xA6,
    0xA7, 0xAB, 0xAC, 0xAD, 0xAE, 0xAF, 0xB2, 0xB3,
    0xB4, 0xB5, 0xB6, 0xB7, 0xB9, 0xBA, 0xBB, 0xBC,
    0xBD, 0xBE, 0xBF, 0xCB, 0xCD, 0xCE, 0xCF, 0xD3,
    0xD6, 0xD7, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE,
    0xDF, 0xE5, 0xE6, 0xE7, 0xE9, 0xEA, 0xEB, 0xEC,
    0xED, 0xEE, 0xEF, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6,
    0xF7, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF,
];

/// 逆変換テーブル（無効なニブルは0xFF）
const READ_TABLE: [u8; 256] = build_read_table();

const fn build_read_table() -> [u8; 256] {
    let mut table = [0xFF; 256];
    let mut i = 0;
    while i < WRITE_TABLE.len() {
        table[WRITE_TABLE[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// DOS 3.3セクターインターリーブ（物理セクタ -> イメージ内セクタ）
pub const DOS_SECTOR_ORDER: [usize; 16] = [0, 7, 14, 6, 13, 5, 12, 4, 11, 3, 10, 2, 9, 1, 8, 15];

/// デコードエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NibbleError {
    /// 入力が短すぎる
    ShortBuffer,
    /// 変換テーブルにないニブル
    InvalidNibble { index: usize, value: u8 },
    /// プロローグ/エピローグが見つからない
    MissingMarker(usize),
    /// チェックサム不一致
    Checksum,
}

impl fmt::Display for NibbleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NibbleError::ShortBuffer => write!(f, "nibble buffer too short"),
            NibbleError::InvalidNibble { index, value } => {
                write!(f, "invalid nibble ${:02X} at {}", value, index)
            }
            NibbleError::MissingMarker(pos) => write!(f, "missing field marker at {}", pos),
            NibbleError::Checksum => write!(f, "checksum mismatch"),
        }
    }
}

impl std::error::Error for NibbleError {}

/// アドレスフィールドの内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressField {
    pub volume: u8,
    pub track: u8,
    pub sector: u8,
}

/// 4-and-4（odd-even）エンコード: [odd, even]
#[inline]
pub fn odd_even_encode(value: u8) -> [u8; 2] {
    [((value & 0xAA) >> 1) | 0xAA, (value & 0x55) | 0xAA]
}

/// 4-and-4デコード
#[inline]
pub fn odd_even_decode(odd: u8, even: u8) -> u8 {
    ((odd << 1) | 0x01) & even
}

/// 下位2ビットを取り出してビット0と1を入れ替える
#[inline]
fn swap_low2(value: u8) -> u8 {
    ((value & 0x01) << 1) | ((value & 0x02) >> 1)
}

/// 6-and-2エンコーディング
///
/// 342バイトのニブル列と、チェーンXORの最後の値（チェックサム）を返す。
pub fn encode_6and2(data: &[u8; BYTES_PER_SECTOR]) -> ([u8; USER_DATA_LEN], u8) {
    let mut out = [0u8; USER_DATA_LEN];

    // 補助バッファ: 3バイト分の下位2ビットを1ニブルに詰める
    // 0x56 * 3 = 258 なので最後の2エントリは上位2ビットが空
    for x in 0..AUX_LEN {
        let b3 = if x < 0x54 { swap_low2(data[AUX_LEN * 2 + x]) } else { 0 };
        let b2 = swap_low2(data[AUX_LEN + x]);
        let b1 = swap_low2(data[x]);
        out[x] = (b3 << 4) | (b2 << 2) | b1;
        debug_assert!(out[x] < 64);
    }

    // メインデータ（上位6ビット）
    for (i, &byte) in data.iter().enumerate() {
        out[AUX_LEN + i] = byte >> 2;
    }

    // チェーンXORして変換
    let mut last = 0u8;
    for nibble in out.iter_mut() {
        let tmp = *nibble ^ last;
        last = *nibble;
        *nibble = WRITE_TABLE[tmp as usize];
    }

    (out, last)
}

/// 6-and-2デコード
///
/// `encoded` は342バイトのデータと1バイトのチェックサム。
pub fn decode_6and2(encoded: &[u8]) -> Result<[u8; BYTES_PER_SECTOR], NibbleError> {
    if encoded.len() < USER_DATA_LEN + 1 {
        return Err(NibbleError::ShortBuffer);
    }

    let mut buf = [0u8; USER_DATA_LEN];
    let mut prev = 0u8;
    for (i, &code) in encoded[..USER_DATA_LEN].iter().enumerate() {
        let val = READ_TABLE[code as usize];
        if val == 0xFF {
            return Err(NibbleError::InvalidNibble { index: i, value: code });
        }
        buf[i] = val ^ prev;
        prev = buf[i];
    }

    let code = encoded[USER_DATA_LEN];
    let checksum = READ_TABLE[code as usize];
    if checksum == 0xFF {
        return Err(NibbleError::InvalidNibble { index: USER_DATA_LEN, value: code });
    }
    if checksum ^ prev != 0 {
        return Err(NibbleError::Checksum);
    }

    let mut data = [0u8; BYTES_PER_SECTOR];
    for (i, byte) in data.iter_mut().enumerate() {
        let aux = buf[i % AUX_LEN] >> ((i / AUX_LEN) * 2);
        *byte = (buf[AUX_LEN + i] << 2) | swap_low2(aux & 0x03);
    }
    Ok(data)
}

/// イメージ内のセクタオフセット
pub fn sector_offset(track: usize, sector: usize) -> usize {
    (track * SECTORS_PER_TRACK + DOS_SECTOR_ORDER[sector]) * BYTES_PER_SECTOR
}

/// 1セクタ分のニブル列を構築
pub fn build_sector(track: u8, sector: u8, volume: u8, data: &[u8; BYTES_PER_SECTOR]) -> Vec<u8> {
    let mut out = Vec::with_capacity(RAW_SECTOR_LEN);

    // GAP1
    out.extend(std::iter::repeat(SYNC_BYTE).take(GAP1_LEN));

    // アドレスフィールド
    out.extend_from_slice(&ADDRESS_PROLOGUE);
    out.extend_from_slice(&odd_even_encode(volume));
    out.extend_from_slice(&odd_even_encode(track));
    out.extend_from_slice(&odd_even_encode(sector));
    out.extend_from_slice(&odd_even_encode(volume ^ track ^ sector));
    out.extend_from_slice(&EPILOGUE);

    // GAP2
    out.extend(std::iter::repeat(SYNC_BYTE).take(GAP2_LEN));

    // データフィールド
    out.extend_from_slice(&DATA_PROLOGUE);
    let (encoded, checksum) = encode_6and2(data);
    out.extend_from_slice(&encoded);
    out.push(WRITE_TABLE[checksum as usize]);
    out.extend_from_slice(&EPILOGUE);

    // GAP3
    out.extend(std::iter::repeat(SYNC_BYTE).take(GAP3_LEN));

    debug_assert_eq!(out.len(), RAW_SECTOR_LEN);
    out
}

/// ディスクイメージから物理セクタのニブル列を構築
///
/// イメージ外のトラックは未フォーマット領域として0で埋める。
pub fn build_image_sector(image: &[u8], track: u8, sector: u8, volume: u8) -> Vec<u8> {
    let mut data = [0u8; BYTES_PER_SECTOR];
    if (track as usize) < TRACKS {
        let offset = sector_offset(track as usize, sector as usize);
        if let Some(src) = image.get(offset..offset + BYTES_PER_SECTOR) {
            data.copy_from_slice(src);
        }
    }
    build_sector(track, sector, volume, &data)
}

/// `build_sector` の出力を検証しながらデコード
pub fn decode_sector(raw: &[u8]) -> Result<(AddressField, [u8; BYTES_PER_SECTOR]), NibbleError> {
    let expect = |pos: usize, marker: &[u8; 3]| -> Result<(), NibbleError> {
        match raw.get(pos..pos + 3) {
            Some(bytes) if bytes == marker => Ok(()),
            Some(_) => Err(NibbleError::MissingMarker(pos)),
            None => Err(NibbleError::ShortBuffer),
        }
    };

    let mut pos = GAP1_LEN;
    expect(pos, &ADDRESS_PROLOGUE)?;
    pos += 3;
    let field = raw.get(pos..pos + 8).ok_or(NibbleError::ShortBuffer)?;
    let volume = odd_even_decode(field[0], field[1]);
    let track = odd_even_decode(field[2], field[3]);
    let sector = odd_even_decode(field[4], field[5]);
    let checksum = odd_even_decode(field[6], field[7]);
    if volume ^ track ^ sector != checksum {
        return Err(NibbleError::Checksum);
    }
    pos += 8;
    expect(pos, &EPILOGUE)?;
    pos += 3 + GAP2_LEN;
    expect(pos, &DATA_PROLOGUE)?;
    pos += 3;
    let encoded = raw.get(pos..pos + USER_DATA_LEN + 1).ok_or(NibbleError::ShortBuffer)?;
    let data = decode_6and2(encoded)?;
    pos += USER_DATA_LEN + 1;
    expect(pos, &EPILOGUE)?;

    Ok((AddressField { volume, track, sector }, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sector() -> [u8; BYTES_PER_SECTOR] {
        let mut data = [0u8; BYTES_PER_SECTOR];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        data
    }

    #[test]
    fn test_odd_even() {
        assert_eq!(odd_even_encode(0xFE), [0xFF, 0xFE]);
        assert_eq!(odd_even_encode(0x00), [0xAA, 0xAA]);
        for v in 0..=255u8 {
            let [odd, even] = odd_even_encode(v);
            assert!(odd & 0xAA == 0xAA && even & 0xAA == 0xAA);
            assert_eq!(odd_even_decode(odd, even), v);
        }
    }

    #[test]
    fn test_write_table_has_high_bit() {
        for &b in WRITE_TABLE.iter() {
            assert!(b >= 0x96);
        }
        for (i, &b) in WRITE_TABLE.iter().enumerate() {
            assert_eq!(READ_TABLE[b as usize], i as u8);
        }
    }

    #[test]
    fn test_encode_6and2_layout() {
        // 全バイト0x03: 下位2ビットは入れ替えても0b11
        let data = [0x03u8; BYTES_PER_SECTOR];
        let (out, checksum) = encode_6and2(&data);
        // 補助バッファの先頭は 0b11_11_11 = 0x3F、チェーンXOR前の値
        assert_eq!(out[0], WRITE_TABLE[0x3F]);
        // 2番目は同じ値とXORされて0
        assert_eq!(out[1], WRITE_TABLE[0]);
        // 0x54, 0x55 は上位2ビットが空: 0b00_11_11 = 0x0F
        assert_eq!(out[0x54], WRITE_TABLE[0x3F ^ 0x0F]);
        assert_eq!(out[0x55], WRITE_TABLE[0]);
        // メインデータは0、チェックサムは最後の値
        assert_eq!(out[0x56], WRITE_TABLE[0x0F]);
        assert_eq!(checksum, 0);
        for &b in out.iter() {
            assert!(b & 0x80 != 0);
        }
    }

    #[test]
    fn test_swap_low_bits() {
        // bit0だけ立ったバイトは補助バッファでbit1になる
        let mut data = [0u8; BYTES_PER_SECTOR];
        data[0] = 0x01;
        let (out, _) = encode_6and2(&data);
        assert_eq!(out[0], WRITE_TABLE[0x02]);
    }

    #[test]
    fn test_round_trip_and_checksum() {
        let data = sample_sector();
        let (out, checksum) = encode_6and2(&data);
        let mut encoded = out.to_vec();
        encoded.push(WRITE_TABLE[checksum as usize]);
        assert_eq!(decode_6and2(&encoded).unwrap(), data);

        // チェーンXORの結果が0になることを直接確認
        let mut prev = 0u8;
        for &code in encoded[..USER_DATA_LEN].iter() {
            prev ^= READ_TABLE[code as usize];
        }
        assert_eq!(prev ^ READ_TABLE[encoded[USER_DATA_LEN] as usize], 0);
    }

    #[test]
    fn test_decode_detects_corruption() {
        let data = sample_sector();
        let (out, checksum) = encode_6and2(&data);
        let mut encoded = out.to_vec();
        encoded.push(WRITE_TABLE[checksum as usize]);

        let mut bad = encoded.clone();
        bad[100] = 0x00;
        assert_eq!(
            decode_6and2(&bad),
            Err(NibbleError::InvalidNibble { index: 100, value: 0x00 })
        );

        let mut bad = encoded.clone();
        bad[USER_DATA_LEN] = if bad[USER_DATA_LEN] == 0x96 { 0x97 } else { 0x96 };
        assert_eq!(decode_6and2(&bad), Err(NibbleError::Checksum));

        assert_eq!(decode_6and2(&encoded[..10]), Err(NibbleError::ShortBuffer));
    }

    #[test]
    fn test_build_sector_layout() {
        let data = sample_sector();
        let raw = build_sector(17, 5, DEFAULT_VOLUME, &data);
        assert_eq!(raw.len(), RAW_SECTOR_LEN);
        assert_eq!(RAW_SECTOR_LEN, 403);
        assert!(raw[..GAP1_LEN].iter().all(|&b| b == SYNC_BYTE));
        assert_eq!(&raw[GAP1_LEN..GAP1_LEN + 3], &ADDRESS_PROLOGUE);
        assert_eq!(&raw[GAP1_LEN + 3..GAP1_LEN + 5], &[0xFF, 0xFE]);
        assert_eq!(&raw[raw.len() - GAP3_LEN - 3..raw.len() - GAP3_LEN], &EPILOGUE);
        assert!(raw[raw.len() - GAP3_LEN..].iter().all(|&b| b == SYNC_BYTE));

        let (field, decoded) = decode_sector(&raw).unwrap();
        assert_eq!(field, AddressField { volume: 0xFE, track: 17, sector: 5 });
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_sector_interleave() {
        assert_eq!(sector_offset(0, 0), 0);
        assert_eq!(sector_offset(0, 1), 7 * 256);
        assert_eq!(sector_offset(1, 2), (16 + 14) * 256);
        assert_eq!(sector_offset(34, 15), DSK_SIZE - 256);
    }

    #[test]
    fn test_build_image_sector() {
        let mut image = vec![0u8; DSK_SIZE];
        let offset = sector_offset(3, 1);
        image[offset..offset + 256].copy_from_slice(&sample_sector());

        let raw = build_image_sector(&image, 3, 1, DEFAULT_VOLUME);
        let (field, data) = decode_sector(&raw).unwrap();
        assert_eq!(field.track, 3);
        assert_eq!(field.sector, 1);
        assert_eq!(data, sample_sector());

        // イメージ外のトラックは0で埋める
        let raw = build_image_sector(&image, 39, 0, DEFAULT_VOLUME);
        let (_, data) = decode_sector(&raw).unwrap();
        assert_eq!(data, [0u8; 256]);
    }
}
