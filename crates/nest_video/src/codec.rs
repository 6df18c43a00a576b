//!Decodes compressed images into frames, resizes them to the canonical size, and encodes frames back to JPEG.

use std::sync::Arc;

use bytes::Bytes;
use image::{imageops::FilterType, Rgb};
use jpeg_encoder::{ColorType, Encoder};
use tracing::error;

use crate::frame::{Frame, FrameSize};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("could not encode jpeg: {0}")]
    Encode(#[from] jpeg_encoder::EncodingError),
    #[error("frame {width}x{height} is too large to encode")]
    TooLarge { width: u32, height: u32 },
    #[error("codec task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy)]
pub struct Codec {
    size: FrameSize,
    quality: u8,
}

impl Codec {
    pub fn new(size: FrameSize, quality: u8) -> Self {
        Self {
            size,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    ///Decodes any supported image format and normalizes it to the canonical size.
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame, CodecError> {
        let image = image::load_from_memory(bytes)?.to_rgb8();
        Ok(self.normalize(image))
    }

    pub fn normalize(&self, frame: Frame) -> Frame {
        let FrameSize { width, height } = self.size;
        if frame.dimensions() == (width, height) {
            frame
        } else {
            image::imageops::resize(&frame, width, height, FilterType::Triangle)
        }
    }

    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>, CodecError> {
        let (width, height) = frame.dimensions();
        let too_large = || CodecError::TooLarge { width, height };
        let w = u16::try_from(width).map_err(|_| too_large())?;
        let h = u16::try_from(height).map_err(|_| too_large())?;

        let mut jpeg_buffer = Vec::with_capacity(frame.as_raw().len() / 8);
        let encoder: Encoder<&mut Vec<u8>> = Encoder::new(&mut jpeg_buffer, self.quality);
        encoder.encode(frame.as_raw(), w, h, ColorType::Rgb)?;
        Ok(jpeg_buffer)
    }

    ///[`Codec::decode`] on the blocking pool.
    pub async fn decode_blocking(
        self,
        bytes: impl AsRef<[u8]> + Send + 'static,
    ) -> Result<Frame, CodecError> {
        tokio::task::spawn_blocking(move || self.decode(bytes.as_ref())).await?
    }

    ///[`Codec::encode`] on the blocking pool.
    pub async fn encode_blocking(self, frame: Arc<Frame>) -> Result<Bytes, CodecError> {
        tokio::task::spawn_blocking(move || self.encode(&frame).map(Bytes::from)).await?
    }

    ///Solid black frame shown when no real frame is available.
    pub fn placeholder(&self) -> Frame {
        Frame::from_pixel(self.size.width, self.size.height, Rgb([0, 0, 0]))
    }

    ///The placeholder, encoded once. Empty if even that fails.
    pub fn placeholder_jpeg(&self) -> Bytes {
        match self.encode(&self.placeholder()) {
            Ok(jpeg) => Bytes::from(jpeg),
            Err(err) => {
                error!("could not encode placeholder frame: {err}");
                Bytes::new()
            }
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new(
            FrameSize {
                width: 640,
                height: 360,
            },
            95,
        )
    }
}

#[cfg(test)]
pub(crate) fn jpeg_of(width: u32, height: u32) -> Vec<u8> {
    let frame = Frame::from_pixel(width, height, Rgb([200, 40, 40]));
    Codec::new(FrameSize { width, height }, 90)
        .encode(&frame)
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_codec() -> Codec {
        Codec::new(
            FrameSize {
                width: 32,
                height: 18,
            },
            90,
        )
    }

    #[test]
    fn test_decode_resizes_to_canonical() {
        let codec = small_codec();
        let frame = codec.decode(&jpeg_of(64, 48)).unwrap();
        assert_eq!(frame.dimensions(), (32, 18));
    }

    #[test]
    fn test_decode_keeps_canonical_size() {
        let codec = small_codec();
        let frame = codec.decode(&jpeg_of(32, 18)).unwrap();
        assert_eq!(frame.dimensions(), (32, 18));
        //jpeg is lossy but a flat color survives closely
        let px = frame.get_pixel(10, 10);
        assert!(px[0] > 180 && px[1] < 70);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = small_codec();
        assert!(matches!(codec.decode(b"not an image"), Err(CodecError::Decode(_))));
        assert!(codec.decode(&[]).is_err());
        let truncated = &jpeg_of(32, 18)[..40];
        assert!(codec.decode(truncated).is_err());
    }

    #[test]
    fn test_placeholder_matches_canonical_size() {
        let codec = small_codec();
        let jpeg = codec.placeholder_jpeg();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 18));
    }

    #[tokio::test]
    async fn test_blocking_variants_match() {
        let codec = small_codec();
        let jpeg = jpeg_of(64, 48);
        let frame = codec.decode_blocking(jpeg.clone()).await.unwrap();
        assert_eq!(frame, codec.decode(&jpeg).unwrap());
        assert!(codec.decode_blocking(b"nope").await.is_err());

        let encoded = codec.encode_blocking(Arc::new(frame.clone())).await.unwrap();
        assert_eq!(&encoded[..], &codec.encode(&frame).unwrap()[..]);
    }

    #[test]
    fn test_encode_too_large() {
        let codec = small_codec();
        let frame = Frame::new(70_000, 1);
        assert!(matches!(codec.encode(&frame), Err(CodecError::TooLarge { .. })));
    }
}
