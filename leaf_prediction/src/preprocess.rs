use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use image::{imageops::FilterType, ImageReader};
use ndarray::Array4;
use std::io::Cursor;
use thiserror::Error;

pub const INPUT_WIDTH: u32 = 224;
pub const INPUT_HEIGHT: u32 = 224;
pub const INPUT_CHANNELS: usize = 3;
pub const INPUT_SHAPE: [usize; 4] = [
    1,
    INPUT_HEIGHT as usize,
    INPUT_WIDTH as usize,
    INPUT_CHANNELS,
];

/// Bicubic, the default `resize` filter of the tooling the model was served with.
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("image data is empty")]
    Empty,
    #[error("invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("error reading image: {0}")]
    Read(#[from] std::io::Error),
    #[error("error decoding image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("unexpected tensor layout: {0}")]
    Layout(#[from] ndarray::ShapeError),
}

/// An uploaded image, either raw file bytes or base64 text.
#[derive(Debug, Clone)]
pub enum ImageInput {
    Bytes(Bytes),
    Base64(String),
}

impl ImageInput {
    fn into_bytes(self) -> Result<Bytes, PreprocessError> {
        match self {
            ImageInput::Bytes(bytes) => Ok(bytes),
            ImageInput::Base64(text) => decode_base64(&text).map(Bytes::from),
        }
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        ImageInput::Bytes(Bytes::from(bytes))
    }
}

impl From<Bytes> for ImageInput {
    fn from(bytes: Bytes) -> Self {
        ImageInput::Bytes(bytes)
    }
}

fn decode_base64(text: &str) -> Result<Vec<u8>, PreprocessError> {
    let text = text.trim();
    // data:image/png;base64,....
    let payload = match text.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => text,
    };
    let compact: String = payload.split_whitespace().collect();
    Ok(STANDARD.decode(compact)?)
}

pub fn prepare(input: ImageInput) -> Result<Array4<f32>, PreprocessError> {
    let bytes = input.into_bytes()?;
    prepare_bytes(&bytes)
}

pub fn prepare_bytes(image_data: &[u8]) -> Result<Array4<f32>, PreprocessError> {
    if image_data.is_empty() {
        return Err(PreprocessError::Empty);
    }

    let original_img = ImageReader::new(Cursor::new(image_data))
        .with_guessed_format()?
        .decode()?;

    // Grayscale, alpha and 16-bit sources all collapse to 8-bit RGB first.
    let rgb = original_img.to_rgb8();
    let resized = image::imageops::resize(&rgb, INPUT_WIDTH, INPUT_HEIGHT, RESIZE_FILTER);

    let values = resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.)
        .collect::<Vec<f32>>();

    Ok(Array4::from_shape_vec(
        (
            INPUT_SHAPE[0],
            INPUT_SHAPE[1],
            INPUT_SHAPE[2],
            INPUT_SHAPE[3],
        ),
        values,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb, Rgba};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut image_data: Vec<u8> = Vec::new();
        img.write_to(&mut Cursor::new(&mut image_data), format)
            .unwrap();
        image_data
    }

    fn assert_normalized(input: &Array4<f32>) {
        assert_eq!(input.shape(), &INPUT_SHAPE);
        assert!(input.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_prepare_rgb_png() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 60, Rgb([255, 0, 51]));
        let image_data = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

        let input = prepare_bytes(&image_data).unwrap();

        assert_normalized(&input);
        assert!((input[[0, 10, 10, 0]] - 1.0).abs() < 1e-6);
        assert!(input[[0, 10, 10, 1]].abs() < 1e-6);
        assert!((input[[0, 10, 10, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_prepare_grayscale_and_alpha_become_three_channels() {
        let gray = ImageBuffer::<Luma<u8>, Vec<u8>>::from_pixel(31, 517, Luma([128]));
        let input = prepare_bytes(&encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png))
            .unwrap();
        assert_normalized(&input);
        let expected = 128.0 / 255.0;
        assert!((input[[0, 100, 100, 0]] - expected).abs() < 1e-6);
        assert!((input[[0, 100, 100, 2]] - expected).abs() < 1e-6);

        let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_pixel(640, 480, Rgba([0, 255, 0, 10]));
        let input = prepare_bytes(&encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png))
            .unwrap();
        assert_normalized(&input);
        assert!((input[[0, 0, 0, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_prepare_jpeg_of_arbitrary_size() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_fn(1024, 17, |x, y| {
            Rgb([(x % 256) as u8, (y * 10) as u8, 200])
        });
        let image_data = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        assert_normalized(&prepare_bytes(&image_data).unwrap());
    }

    #[test]
    fn test_prepare_is_deterministic() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_fn(50, 70, |x, y| {
            Rgb([x as u8, y as u8, (x + y) as u8])
        });
        let image_data = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

        assert_eq!(
            prepare_bytes(&image_data).unwrap(),
            prepare_bytes(&image_data).unwrap()
        );
    }

    #[test]
    fn test_prepare_base64_matches_raw_bytes() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(8, 8, Rgb([10, 20, 30]));
        let image_data = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);
        let encoded = STANDARD.encode(&image_data);

        let from_raw = prepare(ImageInput::from(image_data)).unwrap();
        let from_text = prepare(ImageInput::Base64(encoded.clone())).unwrap();
        let from_data_uri =
            prepare(ImageInput::Base64(format!("data:image/png;base64,{}\n", encoded))).unwrap();

        assert_eq!(from_raw, from_text);
        assert_eq!(from_raw, from_data_uri);
    }

    #[test]
    fn test_prepare_rejects_non_images() {
        assert!(matches!(prepare_bytes(&[]), Err(PreprocessError::Empty)));
        assert!(matches!(
            prepare_bytes(b"definitely not an image"),
            Err(PreprocessError::Decode(_))
        ));
        assert!(matches!(
            prepare(ImageInput::Base64("%%%".to_string())),
            Err(PreprocessError::Base64(_))
        ));
        // Valid base64, but not an image.
        assert!(matches!(
            prepare(ImageInput::Base64(STANDARD.encode(b"hello"))),
            Err(PreprocessError::Decode(_))
        ));
    }
}
