//! Perceptual image hashing.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageReader};
use image_hasher::{HashAlg, HasherConfig, ImageHash};

use crate::error::Result;

/// Compute the perceptual hash of a decoded image.
///
/// `hash_size` is the edge length of the hash grid; larger sizes are slower
/// but tell apart images that only look alike at thumbnail scale.
pub fn hash_image(image: &DynamicImage, hash_size: u32) -> ImageHash {
    let hasher = HasherConfig::new()
        .hash_size(hash_size, hash_size)
        .hash_alg(HashAlg::DoubleGradient)
        .to_hasher();

    hasher.hash_image(image)
}

/// Decode an in-memory image and hash it.
pub fn hash_bytes(bytes: &[u8], hash_size: u32) -> Result<ImageHash> {
    let image = image::load_from_memory(bytes)?;
    Ok(hash_image(&image, hash_size))
}

/// Decode an image file and hash it.
pub fn hash_file(path: &Path, hash_size: u32) -> Result<ImageHash> {
    let image = image::open(path)?;
    Ok(hash_image(&image, hash_size))
}

/// Width and height from the image header, without decoding pixels.
pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

/// Normalized Hamming similarity: 1.0 for identical hashes, 0.0 for opposite.
///
/// Hashes of different widths are never similar.
pub fn similarity(a: &ImageHash, b: &ImageHash) -> f64 {
    let bits = a.as_bytes().len() * 8;
    if bits == 0 || a.as_bytes().len() != b.as_bytes().len() {
        return 0.0;
    }

    1.0 - f64::from(a.dist(b)) / bits as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{gradient_png, png};

    #[test]
    fn test_identical_images_have_full_similarity() {
        let bytes = gradient_png(64, 64, false);
        let a = hash_bytes(&bytes, 16).unwrap();
        let b = hash_bytes(&bytes, 16).unwrap();
        assert_eq!(similarity(&a, &b), 1.0);
    }

    #[test]
    fn test_different_images_are_dissimilar() {
        let horizontal = hash_bytes(&gradient_png(64, 64, false), 16).unwrap();
        let vertical = hash_bytes(&gradient_png(64, 64, true), 16).unwrap();
        assert!(similarity(&horizontal, &vertical) < 0.9);
    }

    #[test]
    fn test_mismatched_sizes_are_not_similar() {
        let bytes = gradient_png(64, 64, false);
        let small = hash_bytes(&bytes, 8).unwrap();
        let large = hash_bytes(&bytes, 16).unwrap();
        assert_eq!(similarity(&small, &large), 0.0);
    }

    #[test]
    fn test_image_dimensions_from_header() {
        let bytes = png(120, 45, |x, _| x as u8);
        assert_eq!(image_dimensions(&bytes).unwrap(), (120, 45));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(hash_bytes(b"<html>not an image</html>", 16).is_err());
        assert!(image_dimensions(b"nope").is_err());
    }
}
