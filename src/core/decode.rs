//! Stream filter pipeline.
//!
//! Filters are applied left-to-right in the order the stream dictionary
//! declares them. Image codecs (DCT, CCITT, JPX, JBIG2) end the pipeline and
//! are handed back undecoded so the image extractor can package them.
//! Every decoder enforces the decoded-size limit while it writes, so a
//! decompression bomb fails before it allocates.

use super::error::{LimitKind, PDFError, PDFResult};
use super::parser::{Dict, PDFObject};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Image codecs that are passed through instead of decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageCodec {
    /// DCTDecode (baseline/progressive JPEG)
    Dct,
    /// CCITTFaxDecode (Group 3/4 fax)
    CcittFax,
    /// JPXDecode (JPEG 2000)
    Jpx,
    /// JBIG2Decode
    Jbig2,
}

/// One entry of a stream's filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Full filter name (abbreviations are expanded)
    pub name: String,
    /// Matching /DecodeParms dictionary, if any
    pub params: Option<Dict>,
}

/// Output of the pipeline.
#[derive(Debug, Clone)]
pub struct DecodedStream {
    /// Bytes after every non-image filter has been applied
    pub data: Vec<u8>,
    /// Image codec that stopped the pipeline
    pub image_codec: Option<ImageCodec>,
    /// /DecodeParms of the image codec
    pub codec_params: Option<Dict>,
}

impl DecodedStream {
    /// Returns fully decoded bytes, rejecting image-encoded payloads.
    pub fn into_data(self) -> PDFResult<Vec<u8>> {
        match self.image_codec {
            None => Ok(self.data),
            Some(codec) => Err(PDFError::UnsupportedFilter(format!(
                "{} in a non-image stream",
                codec_filter_name(codec)
            ))),
        }
    }
}

fn codec_filter_name(codec: ImageCodec) -> &'static str {
    match codec {
        ImageCodec::Dct => "DCTDecode",
        ImageCodec::CcittFax => "CCITTFaxDecode",
        ImageCodec::Jpx => "JPXDecode",
        ImageCodec::Jbig2 => "JBIG2Decode",
    }
}

/// Expands the abbreviated filter names allowed in inline images.
pub fn canonical_filter_name(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
}

/// Reads the filter chain from a stream (or inline image) dictionary.
///
/// Filter and parameter entries must already be direct objects.
pub fn filters_from_dict(dict: &Dict) -> Vec<Filter> {
    let filter_obj = dict.get("Filter").or_else(|| {
        // Inline images abbreviate Filter as F; a stream's /F is a file spec
        dict.get("F").filter(|f| {
            f.as_name().is_some()
                || f
                    .as_array()
                    .is_some_and(|items| items.iter().all(|i| i.as_name().is_some()))
        })
    });
    let params_obj = dict.get("DecodeParms").or_else(|| dict.get("DP"));

    let names: Vec<&str> = match filter_obj {
        Some(PDFObject::Name(name)) => vec![name.as_str()],
        Some(PDFObject::Array(items)) => items.iter().filter_map(PDFObject::as_name).collect(),
        _ => Vec::new(),
    };

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let params = match params_obj {
                Some(PDFObject::Dictionary(d)) if i == 0 => Some(d.clone()),
                Some(PDFObject::Array(items)) => items.get(i).and_then(|p| p.as_dict()).cloned(),
                _ => None,
            };
            Filter {
                name: canonical_filter_name(name).to_string(),
                params,
            }
        })
        .collect()
}

/// Decodes a stream payload through its declared filter chain.
pub fn decode_stream(dict: &Dict, raw: &[u8], max_decoded_bytes: usize) -> PDFResult<DecodedStream> {
    decode_filters(raw, &filters_from_dict(dict), max_decoded_bytes)
}

/// Applies `filters` left-to-right.
///
/// Stops at the first image codec and returns the bytes accumulated so far.
pub fn decode_filters(
    raw: &[u8],
    filters: &[Filter],
    max_decoded_bytes: usize,
) -> PDFResult<DecodedStream> {
    check_size(raw.len(), max_decoded_bytes)?;
    let mut data = raw.to_vec();

    for (i, filter) in filters.iter().enumerate() {
        let codec = match filter.name.as_str() {
            "DCTDecode" => Some(ImageCodec::Dct),
            "CCITTFaxDecode" => Some(ImageCodec::CcittFax),
            "JPXDecode" => Some(ImageCodec::Jpx),
            "JBIG2Decode" => Some(ImageCodec::Jbig2),
            _ => None,
        };
        if let Some(codec) = codec {
            if i + 1 < filters.len() {
                log::warn!(
                    "Ignoring {} filter(s) after image codec {}",
                    filters.len() - i - 1,
                    filter.name
                );
            }
            return Ok(DecodedStream {
                data,
                image_codec: Some(codec),
                codec_params: filter.params.clone(),
            });
        }

        data = apply_filter(&data, filter, max_decoded_bytes)?;
        log::trace!("{} produced {} bytes", filter.name, data.len());
    }

    Ok(DecodedStream {
        data,
        image_codec: None,
        codec_params: None,
    })
}

fn apply_filter(data: &[u8], filter: &Filter, max: usize) -> PDFResult<Vec<u8>> {
    let params = filter.params.as_ref();
    match filter.name.as_str() {
        "FlateDecode" => {
            let inflated = decode_flate(data, max)?;
            apply_predictor(inflated, params, max)
        }
        "LZWDecode" => {
            let early_change = params
                .and_then(|p| p.get("EarlyChange"))
                .and_then(PDFObject::as_i64)
                .unwrap_or(1)
                != 0;
            let expanded = decode_lzw(data, early_change, max)?;
            apply_predictor(expanded, params, max)
        }
        "ASCIIHexDecode" => decode_ascii_hex(data),
        "ASCII85Decode" => decode_ascii85(data),
        "RunLengthDecode" => decode_run_length(data, max),
        "Crypt" => {
            let name = params
                .and_then(|p| p.get("Name"))
                .and_then(PDFObject::as_name)
                .unwrap_or("Identity");
            if name == "Identity" {
                Ok(data.to_vec())
            } else {
                Err(PDFError::UnsupportedFilter(format!("Crypt /{}", name)))
            }
        }
        other => Err(PDFError::UnsupportedFilter(other.to_string())),
    }
}

fn check_size(len: usize, max: usize) -> PDFResult<()> {
    if len > max {
        return Err(PDFError::limit(
            LimitKind::MaxDecodedBytes,
            format!("decoded stream exceeds {} bytes", max),
        ));
    }
    Ok(())
}

/// True when the first two bytes form a valid zlib header.
fn has_zlib_header(data: &[u8]) -> bool {
    match data {
        [cmf, flg, ..] => cmf & 0x0F == 8 && ((*cmf as u16) << 8 | *flg as u16) % 31 == 0,
        _ => false,
    }
}

fn read_limited<R: Read>(reader: R, max: usize) -> std::io::Result<(Vec<u8>, bool)> {
    let mut out = Vec::new();
    let budget = u64::try_from(max).unwrap_or(u64::MAX).saturating_add(1);
    reader.take(budget).read_to_end(&mut out)?;
    let over = out.len() > max;
    Ok((out, over))
}

/// Decodes a FlateDecode (zlib/deflate) compressed stream.
///
/// Raw deflate is only attempted when the data carries no zlib header, so
/// a corrupt zlib stream reliably reports [`PDFError::CorruptStream`].
pub fn decode_flate(compressed_data: &[u8], max: usize) -> PDFResult<Vec<u8>> {
    let result = if has_zlib_header(compressed_data) {
        read_limited(ZlibDecoder::new(compressed_data), max)
    } else {
        read_limited(DeflateDecoder::new(compressed_data), max)
    };

    match result {
        Ok((_, true)) => Err(PDFError::limit(
            LimitKind::MaxDecodedBytes,
            format!("FlateDecode output exceeds {} bytes", max),
        )),
        Ok((data, false)) => Ok(data),
        Err(e) => Err(PDFError::corrupt(
            "FlateDecode",
            format!("{} ({} input bytes)", e, compressed_data.len()),
        )),
    }
}

/// Decodes LZWDecode data (variable 9-12 bit codes, MSB first).
pub fn decode_lzw(data: &[u8], early_change: bool, max: usize) -> PDFResult<Vec<u8>> {
    const CLEAR: usize = 256;
    const EOD: usize = 257;

    let mut table: Vec<Vec<u8>> = Vec::with_capacity(4096);
    let reset = |table: &mut Vec<Vec<u8>>| {
        table.clear();
        table.extend((0..=255u8).map(|b| vec![b]));
        table.push(Vec::new());
        table.push(Vec::new());
    };
    reset(&mut table);

    let mut out = Vec::new();
    let mut code_len = 9;
    let mut prev: Option<usize> = None;
    let mut bit_buf: u32 = 0;
    let mut bit_count = 0;
    let mut input = data.iter();

    loop {
        while bit_count < code_len {
            let Some(&byte) = input.next() else {
                return Ok(out);
            };
            bit_buf = (bit_buf << 8) | byte as u32;
            bit_count += 8;
        }
        let code = ((bit_buf >> (bit_count - code_len)) & ((1 << code_len) - 1)) as usize;
        bit_count -= code_len;

        match code {
            CLEAR => {
                reset(&mut table);
                code_len = 9;
                prev = None;
                continue;
            }
            EOD => break,
            _ => {}
        }

        let entry = if code < table.len() && code != CLEAR && code != EOD {
            table[code].clone()
        } else if code == table.len() {
            let Some(p) = prev else {
                return Err(PDFError::corrupt("LZWDecode", format!("unexpected code {}", code)));
            };
            let mut entry = table[p].clone();
            entry.push(table[p][0]);
            entry
        } else {
            return Err(PDFError::corrupt("LZWDecode", format!("invalid code {}", code)));
        };

        out.extend_from_slice(&entry);
        check_size(out.len(), max)?;

        if let Some(p) = prev {
            if table.len() < 4096 {
                let mut new_entry = table[p].clone();
                new_entry.push(entry[0]);
                table.push(new_entry);
            }
        }
        prev = Some(code);

        let next = table.len() + early_change as usize;
        code_len = match next {
            n if n >= 2048 => 12,
            n if n >= 1024 => 11,
            n if n >= 512 => 10,
            _ => 9,
        };
    }

    Ok(out)
}

/// Decodes ASCIIHex-encoded data. Whitespace is ignored; `>` ends the data.
pub fn decode_ascii_hex(data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &byte in data {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            b'>' => break,
            b if b.is_ascii_whitespace() || b == 0 => continue,
            other => {
                return Err(PDFError::corrupt(
                    "ASCIIHexDecode",
                    format!("invalid hex character 0x{:02x}", other),
                ));
            }
        };
        match high.take() {
            None => high = Some(digit),
            Some(h) => result.push((h << 4) | digit),
        }
    }

    // Odd number of digits: implicit trailing 0
    if let Some(h) = high {
        result.push(h << 4);
    }

    Ok(result)
}

/// Decodes ASCII85 (Base85) encoded data.
pub fn decode_ascii85(data: &[u8]) -> PDFResult<Vec<u8>> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let mut result = Vec::with_capacity(data.len() * 4 / 5);
    let mut tuple: u64 = 0;
    let mut count = 0usize;

    for &byte in data {
        match byte {
            b'~' => break,
            b'z' if count == 0 => result.extend_from_slice(&[0u8; 4]),
            b'z' => {
                return Err(PDFError::corrupt("ASCII85Decode", "'z' inside a group"));
            }
            b'!'..=b'u' => {
                tuple = tuple * 85 + (byte - b'!') as u64;
                count += 1;
                if count == 5 {
                    if tuple > u32::MAX as u64 {
                        return Err(PDFError::corrupt("ASCII85Decode", "group overflows 32 bits"));
                    }
                    result.extend_from_slice(&(tuple as u32).to_be_bytes());
                    tuple = 0;
                    count = 0;
                }
            }
            b if b.is_ascii_whitespace() || b == 0 => {}
            other => {
                return Err(PDFError::corrupt(
                    "ASCII85Decode",
                    format!("invalid character 0x{:02x}", other),
                ));
            }
        }
    }

    // A partial group of n chars yields n-1 bytes, padded with 'u'
    if count > 1 {
        for _ in count..5 {
            tuple = tuple * 85 + 84;
        }
        let bytes = (tuple.min(u32::MAX as u64) as u32).to_be_bytes();
        result.extend_from_slice(&bytes[..count - 1]);
    }

    Ok(result)
}

/// Decodes RunLengthDecode data.
pub fn decode_run_length(data: &[u8], max: usize) -> PDFResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut i = 0;

    while i < data.len() {
        let length = data[i] as usize;
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let end = (i + length + 1).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                let Some(&byte) = data.get(i) else {
                    break;
                };
                out.extend(std::iter::repeat_n(byte, 257 - length));
                i += 1;
            }
        }
        check_size(out.len(), max)?;
    }

    Ok(out)
}

/// Undoes a TIFF (2) or PNG (10-15) predictor described by /DecodeParms.
pub fn apply_predictor(data: Vec<u8>, params: Option<&Dict>, max: usize) -> PDFResult<Vec<u8>> {
    let Some(params) = params else {
        return Ok(data);
    };
    let int = |key: &str, default: usize| {
        params
            .get(key)
            .and_then(PDFObject::as_usize)
            .unwrap_or(default)
    };
    let predictor = int("Predictor", 1);
    if predictor <= 1 {
        return Ok(data);
    }

    let colors = int("Colors", 1).clamp(1, 32);
    let bits = int("BitsPerComponent", 8);
    let columns = int("Columns", 1).max(1);
    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return Err(PDFError::corrupt(
            "Predictor",
            format!("invalid BitsPerComponent {}", bits),
        ));
    }

    let output = if predictor == 2 {
        decode_tiff_predictor(data, colors, bits, columns)?
    } else if predictor >= 10 {
        decode_png_predictor(&data, colors, bits, columns)?
    } else {
        return Err(PDFError::UnsupportedFilter(format!("predictor {}", predictor)));
    };
    check_size(output.len(), max)?;
    Ok(output)
}

/// Reverses PNG row prediction.
///
/// Every row starts with its own algorithm byte, so /Predictor values 10-15
/// are all handled the same way. A trailing partial row is decoded as far as
/// it goes.
pub fn decode_png_predictor(
    data: &[u8],
    colors: usize,
    bits_per_component: usize,
    columns: usize,
) -> PDFResult<Vec<u8>> {
    let pix_bytes = row_size(1, colors, bits_per_component)?;
    let row_bytes = row_size(columns, colors, bits_per_component)?;
    let stride = row_bytes.saturating_add(1);

    // A row can never hold more bytes than the input carries.
    let buffer_len = row_bytes.min(data.len());
    let mut output = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; buffer_len];
    let mut row = vec![0u8; buffer_len];

    for chunk in data.chunks(stride) {
        let (&algorithm, raw) = match chunk.split_first() {
            Some(split) => split,
            None => break,
        };
        let n = raw.len();
        row[..n].copy_from_slice(raw);

        match algorithm {
            0 => {}
            1 => {
                for i in pix_bytes..n {
                    row[i] = row[i].wrapping_add(row[i - pix_bytes]);
                }
            }
            2 => {
                for i in 0..n {
                    row[i] = row[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                for i in 0..n {
                    let left = if i >= pix_bytes { row[i - pix_bytes] as u16 } else { 0 };
                    let avg = ((left + prev_row[i] as u16) / 2) as u8;
                    row[i] = row[i].wrapping_add(avg);
                }
            }
            4 => {
                for i in 0..n {
                    let left = if i >= pix_bytes { row[i - pix_bytes] as i16 } else { 0 };
                    let up = prev_row[i] as i16;
                    let up_left = if i >= pix_bytes { prev_row[i - pix_bytes] as i16 } else { 0 };

                    let p = left + up - up_left;
                    let (pa, pb, pc) = ((p - left).abs(), (p - up).abs(), (p - up_left).abs());
                    let paeth = if pa <= pb && pa <= pc {
                        left
                    } else if pb <= pc {
                        up
                    } else {
                        up_left
                    };
                    row[i] = row[i].wrapping_add(paeth as u8);
                }
            }
            other => {
                return Err(PDFError::corrupt(
                    "Predictor",
                    format!("unknown PNG row filter {}", other),
                ));
            }
        }

        output.extend_from_slice(&row[..n]);
        prev_row[..n].copy_from_slice(&row[..n]);
    }

    Ok(output)
}

/// Bytes per row of `columns` samples, failing on overflowing /DecodeParms.
fn row_size(columns: usize, colors: usize, bits: usize) -> PDFResult<usize> {
    columns
        .checked_mul(colors)
        .and_then(|n| n.checked_mul(bits))
        .map(|n| n.div_ceil(8))
        .ok_or_else(|| {
            PDFError::corrupt(
                "Predictor",
                format!("row of {} columns x {} colors overflows", columns, colors),
            )
        })
}

/// Reverses TIFF predictor 2 (horizontal differencing).
fn decode_tiff_predictor(
    mut data: Vec<u8>,
    colors: usize,
    bits: usize,
    columns: usize,
) -> PDFResult<Vec<u8>> {
    let row_bytes = row_size(columns, colors, bits)?;
    match bits {
        8 => {
            for row in data.chunks_mut(row_bytes) {
                for i in colors..row.len() {
                    row[i] = row[i].wrapping_add(row[i - colors]);
                }
            }
        }
        16 => {
            let step = colors * 2;
            for row in data.chunks_mut(row_bytes) {
                let mut i = step;
                while i + 1 < row.len() {
                    let left = u16::from_be_bytes([row[i - step], row[i - step + 1]]);
                    let cur = u16::from_be_bytes([row[i], row[i + 1]]);
                    let [hi, lo] = cur.wrapping_add(left).to_be_bytes();
                    row[i] = hi;
                    row[i + 1] = lo;
                    i += 2;
                }
            }
        }
        _ => {
            return Err(PDFError::UnsupportedFilter(format!(
                "TIFF predictor with {} bits per component",
                bits
            )));
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    const NO_LIMIT: usize = usize::MAX / 2;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn filter(name: &str) -> Filter {
        Filter {
            name: name.to_string(),
            params: None,
        }
    }

    #[test]
    fn test_flate_roundtrip_and_corruption() {
        let encoded = zlib(b"BT /F1 12 Tf ET");
        assert_eq!(decode_flate(&encoded, NO_LIMIT).unwrap(), b"BT /F1 12 Tf ET");

        let mut corrupt = vec![0x78, 0x9C];
        corrupt.extend_from_slice(&[0xFF; 16]);
        assert!(matches!(
            decode_flate(&corrupt, NO_LIMIT),
            Err(PDFError::CorruptStream { .. })
        ));
    }

    #[test]
    fn test_flate_bomb_hits_limit() {
        let encoded = zlib(&vec![0u8; 1 << 20]);
        assert!(matches!(
            decode_flate(&encoded, 4096),
            Err(PDFError::ResourceLimitExceeded {
                limit: LimitKind::MaxDecodedBytes,
                ..
            })
        ));
    }

    #[test]
    fn test_filters_apply_left_to_right() {
        // ASCIIHex wraps the zlib bytes, so it must run first
        let hex: String = zlib(b"payload").iter().map(|b| format!("{:02x}", b)).collect();
        let filters = [filter("ASCIIHexDecode"), filter("FlateDecode")];
        let decoded = decode_filters(format!("{}>", hex).as_bytes(), &filters, NO_LIMIT).unwrap();
        assert_eq!(decoded.data, b"payload");
        assert_eq!(decoded.image_codec, None);
    }

    #[test]
    fn test_image_codec_stops_pipeline() {
        let filters = [filter("ASCIIHexDecode"), filter("DCTDecode")];
        let decoded = decode_filters(b"FFD8FFE0>", &filters, NO_LIMIT).unwrap();
        assert_eq!(decoded.data, vec![0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(decoded.image_codec, Some(ImageCodec::Dct));
        assert!(matches!(decoded.into_data(), Err(PDFError::UnsupportedFilter(_))));
    }

    #[test]
    fn test_unknown_filter_is_unsupported() {
        let result = decode_filters(b"abc", &[filter("BogusDecode")], NO_LIMIT);
        assert_eq!(result.unwrap_err(), PDFError::UnsupportedFilter("BogusDecode".into()));
    }

    #[test]
    fn test_filters_from_dict_with_abbreviations() {
        let mut params = Dict::default();
        params.insert("Predictor".into(), PDFObject::Integer(12));
        let mut dict = Dict::default();
        dict.insert(
            "F".into(),
            PDFObject::Array(vec![PDFObject::Name("AHx".into()), PDFObject::Name("Fl".into())]),
        );
        dict.insert(
            "DP".into(),
            PDFObject::Array(vec![PDFObject::Null, PDFObject::Dictionary(params.clone())]),
        );

        let filters = filters_from_dict(&dict);
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].name, "ASCIIHexDecode");
        assert_eq!(filters[0].params, None);
        assert_eq!(filters[1].name, "FlateDecode");
        assert_eq!(filters[1].params, Some(params));
    }

    #[test]
    fn test_stream_file_spec_is_not_a_filter() {
        let mut dict = Dict::default();
        dict.insert("F".into(), PDFObject::String(b"external.dat".to_vec()));
        assert!(filters_from_dict(&dict).is_empty());
    }

    #[test]
    fn test_ascii_hex() {
        assert_eq!(decode_ascii_hex(b"48 65 6C\n6c6f>").unwrap(), b"Hello");
        assert_eq!(decode_ascii_hex(b"414").unwrap(), vec![0x41, 0x40]);
        assert!(decode_ascii_hex(b"4G").is_err());
    }

    #[test]
    fn test_ascii85() {
        assert_eq!(decode_ascii85(b"87cURD]i,\"Ebo80~>").unwrap(), b"Hello World");
        assert_eq!(decode_ascii85(b"<~z~>").unwrap(), vec![0, 0, 0, 0]);
        // "Hi" encodes to a 3-character final group
        assert_eq!(decode_ascii85(b"88/~>").unwrap(), b"Hi");
        assert!(decode_ascii85(b"8z").is_err());
    }

    #[test]
    fn test_run_length() {
        let data = [2, b'a', b'b', b'c', 254, b'x', 128, b'z'];
        assert_eq!(decode_run_length(&data, NO_LIMIT).unwrap(), b"abcxxx");
    }

    #[test]
    fn test_lzw_spec_example() {
        // Example from the PDF reference: 45 45 45 45 45 65 45 45 45 66
        let encoded = [0x80, 0x0B, 0x60, 0x50, 0x22, 0x0C, 0x0C, 0x85, 0x01];
        assert_eq!(
            decode_lzw(&encoded, true, NO_LIMIT).unwrap(),
            vec![45, 45, 45, 45, 45, 65, 45, 45, 45, 66]
        );
    }

    #[test]
    fn test_png_predictors() {
        // Two rows of 3 bytes: Sub then Up
        let data = [1, 10, 5, 5, 2, 1, 1, 1];
        assert_eq!(
            decode_png_predictor(&data, 1, 8, 3).unwrap(),
            vec![10, 15, 20, 11, 16, 21]
        );
        assert!(decode_png_predictor(&[9, 0, 0, 0], 1, 8, 3).is_err());
    }

    #[test]
    fn test_flate_with_png_predictor_params() {
        let encoded = zlib(&[2, 1, 2, 3, 2, 1, 1, 1]);
        let mut params = Dict::default();
        params.insert("Predictor".into(), PDFObject::Integer(12));
        params.insert("Columns".into(), PDFObject::Integer(3));
        let filters = [Filter {
            name: "FlateDecode".into(),
            params: Some(params),
        }];
        let decoded = decode_filters(&encoded, &filters, NO_LIMIT).unwrap();
        assert_eq!(decoded.data, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_predictor_rows_that_overflow_are_corrupt() {
        let err = decode_png_predictor(&[0; 4], 1, 8, 1 << 62).unwrap_err();
        assert!(matches!(err, PDFError::CorruptStream { .. }));

        let mut params = Dict::default();
        params.insert("Predictor".into(), PDFObject::Integer(2));
        params.insert("Columns".into(), PDFObject::Integer(1 << 62));
        params.insert("Colors".into(), PDFObject::Integer(4));
        let err = apply_predictor(vec![1, 2, 3], Some(&params), NO_LIMIT).unwrap_err();
        assert!(matches!(err, PDFError::CorruptStream { .. }));
    }

    #[test]
    fn test_huge_columns_do_not_allocate_whole_rows() {
        // One partial row: algorithm byte 0 followed by the raw samples.
        let out = decode_png_predictor(&[0, 7, 8, 9], 1, 8, 200_000_000_000).unwrap();
        assert_eq!(out, vec![7, 8, 9]);
    }

    #[test]
    fn test_predicted_output_respects_limit() {
        let mut params = Dict::default();
        params.insert("Predictor".into(), PDFObject::Integer(12));
        params.insert("Columns".into(), PDFObject::Integer(4));
        let err = apply_predictor(vec![0, 1, 2, 3, 4, 0, 5, 6, 7, 8], Some(&params), 6).unwrap_err();
        assert!(matches!(
            err,
            PDFError::ResourceLimitExceeded {
                limit: LimitKind::MaxDecodedBytes,
                ..
            }
        ));
    }

    #[test]
    fn test_flate_without_decoded_limit() {
        assert_eq!(decode_flate(&zlib(b"BT ET"), usize::MAX).unwrap(), b"BT ET");
    }

    #[test]
    fn test_tiff_predictor() {
        let mut params = Dict::default();
        params.insert("Predictor".into(), PDFObject::Integer(2));
        params.insert("Columns".into(), PDFObject::Integer(3));
        let out = apply_predictor(vec![5, 1, 1, 7, 2, 2], Some(&params), NO_LIMIT).unwrap();
        assert_eq!(out, vec![5, 6, 7, 7, 9, 11]);
    }
}
