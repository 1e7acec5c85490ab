//! Image extraction.
//!
//! Image XObjects and inline images are run through every non-image filter.
//! What remains is packaged with its dimensions, color space and placement:
//! - raw samples when nothing image-specific was left
//! - the untouched JPEG, JPEG 2000, JBIG2 or CCITT payload otherwise
//!
//! With the `jpeg-decoding` feature, JPEG headers are probed with zune-jpeg
//! and checked against the dictionary. With `png-export`, raw 8-bit
//! Gray/RGB rasters can be written as PNG through the `image` crate.

use super::content_stream::ImagePaintEvent;
use super::decode::ImageCodec;
use super::diagnostics::{DiagnosticKind, Diagnostics};
use super::error::{PDFError, PDFResult};
use super::graphics_state::Rect;
use super::parser::{Dict, PDFObject};
use super::xref::XRef;
use serde::{Deserialize, Serialize};

/// Nesting limit for Indexed/ICCBased alternates.
const MAX_COLOR_SPACE_DEPTH: usize = 8;

/// How an extracted payload is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageEncoding {
    /// Decoded samples, `bits_per_component` × components per pixel
    Raw,
    /// DCTDecode payload
    Jpeg,
    /// JPXDecode payload
    Jpeg2000,
    /// JBIG2Decode payload
    Jbig2,
    /// CCITTFaxDecode payload
    CcittFax,
}

impl From<Option<ImageCodec>> for ImageEncoding {
    fn from(codec: Option<ImageCodec>) -> Self {
        match codec {
            None => ImageEncoding::Raw,
            Some(ImageCodec::Dct) => ImageEncoding::Jpeg,
            Some(ImageCodec::Jpx) => ImageEncoding::Jpeg2000,
            Some(ImageCodec::Jbig2) => ImageEncoding::Jbig2,
            Some(ImageCodec::CcittFax) => ImageEncoding::CcittFax,
        }
    }
}

/// An image painted on a page, copied out of the document buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedImage {
    pub page: usize,
    /// XObject resource name, None for inline images
    pub name: Option<String>,
    pub encoding: ImageEncoding,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub color_space: String,
    /// Color components per pixel, 0 when unknown
    pub components: u8,
    pub is_mask: bool,
    /// Unit square under the CTM at paint time
    pub placement: Rect,
}

/// A resolved image color space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorSpaceInfo {
    pub name: String,
    pub components: u8,
}

impl ColorSpaceInfo {
    fn new(name: impl Into<String>, components: u8) -> Self {
        ColorSpaceInfo {
            name: name.into(),
            components,
        }
    }
}

/// Resolves a color space value to its family name and component count.
///
/// Fails with [`PDFError::UnsupportedColorSpace`] for Pattern and unknown
/// families.
pub fn resolve_color_space(cs: &PDFObject, xref: &XRef) -> PDFResult<ColorSpaceInfo> {
    resolve_color_space_at(cs, xref, 0)
}

fn resolve_color_space_at(cs: &PDFObject, xref: &XRef, depth: usize) -> PDFResult<ColorSpaceInfo> {
    if depth > MAX_COLOR_SPACE_DEPTH {
        return Err(PDFError::UnsupportedColorSpace(
            "color space nested too deep".to_string(),
        ));
    }
    let cs = xref.fetch_if_ref(cs)?;

    if let Some(name) = cs.as_name() {
        return match name {
            "DeviceGray" | "G" | "CalGray" => Ok(ColorSpaceInfo::new("DeviceGray", 1)),
            "DeviceRGB" | "RGB" | "CalRGB" => Ok(ColorSpaceInfo::new("DeviceRGB", 3)),
            "DeviceCMYK" | "CMYK" => Ok(ColorSpaceInfo::new("DeviceCMYK", 4)),
            other => Err(PDFError::UnsupportedColorSpace(other.to_string())),
        };
    }

    let Some(items) = cs.as_array() else {
        return Err(PDFError::UnsupportedColorSpace(format!(
            "color space is a {}",
            cs.type_name()
        )));
    };
    let family = items.first().and_then(PDFObject::as_name).unwrap_or("");

    match family {
        "DeviceGray" | "DeviceRGB" | "DeviceCMYK" | "G" | "RGB" | "CMYK" if items.len() == 1 => {
            resolve_color_space_at(&items[0], xref, depth + 1)
        }
        "CalGray" => Ok(ColorSpaceInfo::new("CalGray", 1)),
        "CalRGB" => Ok(ColorSpaceInfo::new("CalRGB", 3)),
        "Lab" => Ok(ColorSpaceInfo::new("Lab", 3)),
        "ICCBased" => {
            let stream = match items.get(1) {
                Some(obj) => xref.fetch_if_ref(obj)?,
                None => PDFObject::Null,
            };
            let n = stream.get("N").and_then(PDFObject::as_i64);
            match n {
                Some(n @ (1 | 3 | 4)) => Ok(ColorSpaceInfo::new("ICCBased", n as u8)),
                _ => match stream.get("Alternate") {
                    Some(alternate) => resolve_color_space_at(alternate, xref, depth + 1),
                    None => Err(PDFError::UnsupportedColorSpace(format!(
                        "ICCBased with /N {:?}",
                        n
                    ))),
                },
            }
        }
        "Indexed" | "I" => {
            let base = items.get(1).ok_or_else(|| {
                PDFError::UnsupportedColorSpace("Indexed without base".to_string())
            })?;
            let base = resolve_color_space_at(base, xref, depth + 1)?;
            Ok(ColorSpaceInfo::new(format!("Indexed/{}", base.name), 1))
        }
        "Separation" => Ok(ColorSpaceInfo::new("Separation", 1)),
        "DeviceN" => {
            let names = match items.get(1) {
                Some(obj) => xref.fetch_if_ref(obj)?,
                None => PDFObject::Null,
            };
            let count = names.as_array().map_or(0, <[PDFObject]>::len);
            if count == 0 || count > u8::MAX as usize {
                return Err(PDFError::UnsupportedColorSpace(format!(
                    "DeviceN with {} colorants",
                    count
                )));
            }
            Ok(ColorSpaceInfo::new("DeviceN", count as u8))
        }
        other => Err(PDFError::UnsupportedColorSpace(other.to_string())),
    }
}

/// Looks up an image dictionary entry by full or inline-image name.
fn image_entry(dict: &Dict, xref: &XRef, long: &str, short: &str) -> PDFResult<Option<PDFObject>> {
    match dict.get(long).or_else(|| dict.get(short)) {
        Some(value) => xref.fetch_if_ref(value).map(Some),
        None => Ok(None),
    }
}

/// Packages one painted image.
///
/// Returns `Ok(None)` when the image is dropped; the reason is recorded.
/// Only fatal errors propagate.
pub fn extract_image(
    event: &ImagePaintEvent,
    page: usize,
    xref: &XRef,
    diagnostics: &mut Diagnostics,
) -> PDFResult<Option<ExtractedImage>> {
    let label = match &event.name {
        Some(name) => format!("image /{}", name),
        None => "inline image".to_string(),
    };
    match package(event, page, xref, diagnostics, &label) {
        Ok(image) => Ok(Some(image)),
        Err(e) if e.aborts_page() => Err(e),
        Err(e) => {
            diagnostics.record_error(&label, &e);
            Ok(None)
        }
    }
}

fn package(
    event: &ImagePaintEvent,
    page: usize,
    xref: &XRef,
    diagnostics: &mut Diagnostics,
    label: &str,
) -> PDFResult<ExtractedImage> {
    let dict = &event.dict;
    let decoded = xref.decode_stream(dict, &event.data)?;
    let encoding = ImageEncoding::from(decoded.image_codec);

    let dimension = |long: &str, short: &str| -> PDFResult<u32> {
        Ok(image_entry(dict, xref, long, short)?
            .and_then(|v| v.as_i64())
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0))
    };
    let mut width = dimension("Width", "W")?;
    let mut height = dimension("Height", "H")?;

    let is_mask = image_entry(dict, xref, "ImageMask", "IM")?
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let mut bits_per_component = if is_mask {
        1
    } else {
        image_entry(dict, xref, "BitsPerComponent", "BPC")?
            .and_then(|v| v.as_i64())
            .and_then(|v| u8::try_from(v).ok())
            .unwrap_or(8)
    };

    let color_space = if is_mask {
        ColorSpaceInfo::new("DeviceGray", 1)
    } else {
        match &event.color_space {
            Some(cs) => match resolve_color_space(cs, xref) {
                Ok(info) => info,
                Err(e @ PDFError::UnsupportedColorSpace(_)) => {
                    diagnostics.record_error(label, &e);
                    ColorSpaceInfo::new(describe_color_space(cs), 0)
                }
                Err(e) => return Err(e),
            },
            // JPEG 2000 payloads carry their own color space
            None if encoding == ImageEncoding::Jpeg2000 => ColorSpaceInfo::new("Embedded", 0),
            None => {
                diagnostics.record(
                    DiagnosticKind::UnsupportedColorSpace,
                    format!("{}: no color space", label),
                );
                ColorSpaceInfo::new("Unknown", 0)
            }
        }
    };

    if encoding == ImageEncoding::Jpeg {
        if let Some(header) = probe_jpeg(&decoded.data) {
            if (width, height) != (0, 0) && (header.width, header.height) != (width, height) {
                diagnostics.record(
                    DiagnosticKind::BadImage,
                    format!(
                        "{}: dictionary says {}x{}, JPEG header says {}x{}",
                        label, width, height, header.width, header.height
                    ),
                );
            }
            if (width, height) == (0, 0) {
                width = header.width;
                height = header.height;
                bits_per_component = 8;
            }
            if color_space.components != 0 && header.components != color_space.components {
                diagnostics.record(
                    DiagnosticKind::BadImage,
                    format!(
                        "{}: {} has {} components, JPEG header has {}",
                        label, color_space.name, color_space.components, header.components
                    ),
                );
            }
        } else if cfg!(feature = "jpeg-decoding") {
            diagnostics.record(
                DiagnosticKind::BadImage,
                format!("{}: unreadable JPEG header", label),
            );
        }
    }

    if encoding == ImageEncoding::Raw && color_space.components > 0 {
        let row = (width as usize * color_space.components as usize * bits_per_component as usize)
            .div_ceil(8);
        let expected = row.saturating_mul(height as usize);
        if decoded.data.len() < expected {
            diagnostics.record(
                DiagnosticKind::BadImage,
                format!(
                    "{}: {} bytes of samples, {} expected",
                    label,
                    decoded.data.len(),
                    expected
                ),
            );
        }
    }

    Ok(ExtractedImage {
        page,
        name: event.name.clone(),
        encoding,
        data: decoded.data,
        width,
        height,
        bits_per_component,
        color_space: color_space.name,
        components: color_space.components,
        is_mask,
        placement: event.ctm.transform_rect(&Rect::new(0.0, 0.0, 1.0, 1.0)),
    })
}

/// Name for an unsupported color space, e.g. `Pattern`.
fn describe_color_space(cs: &PDFObject) -> String {
    cs.as_name()
        .or_else(|| cs.as_array().and_then(|a| a.first()).and_then(PDFObject::as_name))
        .unwrap_or("Unknown")
        .to_string()
}

/// Frame header of a JPEG payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegHeader {
    pub width: u32,
    pub height: u32,
    pub components: u8,
}

/// Reads the JPEG frame header without decoding pixels.
#[cfg(feature = "jpeg-decoding")]
pub fn probe_jpeg(data: &[u8]) -> Option<JpegHeader> {
    use std::io::Cursor;
    use zune_jpeg::zune_core::options::DecoderOptions;

    let options = DecoderOptions::default()
        .set_max_width(u16::MAX as usize)
        .set_max_height(u16::MAX as usize);
    let mut decoder = zune_jpeg::JpegDecoder::new_with_options(Cursor::new(data), options);
    if let Err(e) = decoder.decode_headers() {
        log::debug!("JPEG header decode error: {:?}", e);
        return None;
    }
    let info = decoder.info()?;
    Some(JpegHeader {
        width: info.width as u32,
        height: info.height as u32,
        components: info.components,
    })
}

#[cfg(not(feature = "jpeg-decoding"))]
pub fn probe_jpeg(_data: &[u8]) -> Option<JpegHeader> {
    None
}

impl ExtractedImage {
    /// Encodes a raw 8-bit Gray or RGB raster as PNG.
    #[cfg(feature = "png-export")]
    pub fn to_png(&self) -> PDFResult<Vec<u8>> {
        use image::{ExtendedColorType, ImageEncoder};

        let color_type = match (self.encoding, self.bits_per_component, self.components) {
            (ImageEncoding::Raw, 8, 1) => ExtendedColorType::L8,
            (ImageEncoding::Raw, 8, 3) => ExtendedColorType::Rgb8,
            _ => {
                return Err(PDFError::Generic(format!(
                    "PNG export needs raw 8-bit Gray or RGB, got {:?} {}-bit {}",
                    self.encoding, self.bits_per_component, self.color_space
                )));
            }
        };
        let expected = (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(self.components as usize);
        if self.data.len() < expected {
            return Err(PDFError::Generic(format!(
                "raster has {} bytes, {} expected",
                self.data.len(),
                expected
            )));
        }

        let mut png = Vec::new();
        image::codecs::png::PngEncoder::new(&mut png)
            .write_image(&self.data[..expected], self.width, self.height, color_type)
            .map_err(|e| PDFError::Generic(format!("PNG encode error: {}", e)))?;
        Ok(png)
    }
}

/// Serializes byte payloads as standard base64.
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
