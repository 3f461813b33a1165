#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::image_bundle::common::error::BundleError;
    use crate::image_bundle::raster::{
        ColorSpace, ImageFormat, ImageHeader, PixelArray, PixelType, RasterImage, Sample,
    };

    fn rgb_header(width: usize, height: usize) -> ImageHeader {
        ImageHeader::new(ImageFormat::Ppm, ColorSpace::Rgb, width, height, 3).unwrap()
    }

    fn gradient(width: usize, height: usize, pixel_type: PixelType) -> RasterImage {
        let mut image = RasterImage::new(rgb_header(width, height), pixel_type);
        for i in 0..image.pixels().len() {
            image.pixels_mut().set_u8(i, (i % 256) as u8);
        }
        image
    }

    #[test]
    fn test_format_tags() {
        for format in ImageFormat::ALL {
            assert_eq!(ImageFormat::from_tag(format.tag()).unwrap(), format);
        }
        assert!(matches!(
            ImageFormat::from_tag(0),
            Err(BundleError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            ImageFormat::from_tag(42),
            Err(BundleError::UnsupportedFormat(_))
        ));
        assert_eq!(ImageFormat::from_extension("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("tiff"), None);
    }

    #[test]
    fn test_color_space_tags() {
        assert_eq!(ColorSpace::from_tag(1).unwrap(), ColorSpace::Rgb);
        assert_eq!(ColorSpace::from_tag(2).unwrap(), ColorSpace::Lum);
        assert!(matches!(ColorSpace::from_tag(7), Err(BundleError::Format(_))));
    }

    #[test]
    fn test_header_rejects_zero_dimensions() {
        let result = ImageHeader::new(ImageFormat::Jpeg, ColorSpace::Rgb, 0, 10, 3);
        assert!(matches!(result, Err(BundleError::InvalidDimensions(0, 10))));
    }

    #[test]
    fn test_header_rejects_overflowing_sample_count() {
        let result = ImageHeader::new(ImageFormat::Ppm, ColorSpace::Rgb, usize::MAX / 2, 2, 3);
        assert!(matches!(result, Err(BundleError::InvalidDimensions(_, 2))));

        let result = ImageHeader::new(ImageFormat::Ppm, ColorSpace::Rgb, usize::MAX / 3, 1, 3);
        assert!(result.is_ok());
    }

    #[test]
    fn test_header_rejects_band_mismatch() {
        let result = ImageHeader::new(ImageFormat::Jpeg, ColorSpace::Rgb, 4, 4, 1);
        assert!(matches!(result, Err(BundleError::IllegalArgument(_))));

        let result = ImageHeader::new(ImageFormat::Png, ColorSpace::Lum, 4, 4, 3);
        assert!(matches!(result, Err(BundleError::IllegalArgument(_))));
    }

    #[test]
    fn test_header_metadata() {
        let mut header = rgb_header(2, 2);
        assert_eq!(header.metadata("source"), None);

        header.add_metadata("source", "/tmp/a.jpg");
        header.add_metadata("source", "/tmp/b.jpg");
        assert_eq!(header.metadata("source"), Some("/tmp/b.jpg"));
        assert_eq!(header.all_metadata().len(), 1);
        assert!(header.exif().is_none());
    }

    #[test]
    fn test_header_serialization() {
        let mut header = ImageHeader::new(ImageFormat::Png, ColorSpace::Lum, 640, 480, 1).unwrap();
        header.add_metadata("source", "cam-07/frame-0001.png");
        header.add_metadata("label", "cloud");

        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        let parsed = ImageHeader::read_from(&mut Cursor::new(buf)).unwrap();

        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_serialization_without_metadata() {
        let header = rgb_header(3, 5);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();

        // six big-endian i32 fields, the last being a zero metadata length
        assert_eq!(buf.len(), 24);
        assert_eq!(&buf[20..24], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_pixel_array_accessors() {
        let mut float = PixelArray::new(PixelType::Float, 4);
        let mut byte = PixelArray::new(PixelType::Byte, 4);

        float.set_u8(0, 255);
        byte.set_normalized(0, 1.0);
        assert_eq!(float.get_normalized(0), 1.0);
        assert_eq!(byte.get_u8(0), 255);

        byte.set_normalized(1, 1.7);
        byte.set_normalized(2, -0.3);
        assert_eq!(byte.get_u8(1), 255);
        assert_eq!(byte.get_u8(2), 0);

        float.set_normalized(1, 1.7);
        float.set_normalized(2, -0.3);
        assert_eq!(float.get_normalized(1), 1.0);
        assert_eq!(float.get_normalized(2), 0.0);

        float.set(3, Sample::Byte(51));
        assert!((float.get_normalized(3) - 0.2).abs() < 1e-6);
        assert_eq!(float.sample_size(), 4);
        assert_eq!(byte.sample_size(), 1);
    }

    #[test]
    fn test_pixel_array_from_u8() {
        let samples = [0u8, 128, 255];
        let float = PixelArray::from_u8(PixelType::Float, &samples);
        let byte = PixelArray::from_u8(PixelType::Byte, &samples);

        assert_eq!(float.to_u8_vec(), samples.to_vec());
        assert_eq!(byte.as_bytes(), Some(&samples[..]));
        assert!(byte.as_float().is_none());
    }

    #[test]
    fn test_from_parts_checks_length() {
        let result = RasterImage::from_parts(rgb_header(2, 2), PixelArray::new(PixelType::Byte, 11));
        assert!(matches!(result, Err(BundleError::IllegalArgument(_))));

        let image =
            RasterImage::from_parts(rgb_header(2, 2), PixelArray::new(PixelType::Byte, 12)).unwrap();
        assert_eq!(image.pixel_type(), PixelType::Byte);
    }

    #[test]
    fn test_equals_with_tolerance_across_storage() {
        let float = gradient(4, 3, PixelType::Float);
        let byte = gradient(4, 3, PixelType::Byte);
        assert!(float.equals_with_tolerance(&byte, 1e-6));

        let mut shifted = float.clone();
        shifted.add_scalar(0.01).unwrap();
        assert!(!float.equals_with_tolerance(&shifted, 0.005));
        assert!(float.equals_with_tolerance(&shifted, 0.02));

        let other_shape = gradient(3, 4, PixelType::Float);
        assert!(!float.equals_with_tolerance(&other_shape, 1.0));
    }

    #[test]
    fn test_crop() {
        let image = gradient(4, 3, PixelType::Byte);
        let cropped = image.crop(1, 1, 2, 2).unwrap();

        assert_eq!(cropped.width(), 2);
        assert_eq!(cropped.height(), 2);
        // first pixel of the crop is pixel (1, 1) of the source
        let src = (4 + 1) * 3;
        assert_eq!(cropped.pixels().get_u8(0), image.pixels().get_u8(src));

        assert!(matches!(
            image.crop(3, 0, 2, 1),
            Err(BundleError::IllegalArgument(_))
        ));
    }

    #[test]
    fn test_to_luminance() {
        let mut image = RasterImage::new(rgb_header(1, 1), PixelType::Float);
        image.pixels_mut().set_normalized(0, 1.0);
        image.pixels_mut().set_normalized(1, 1.0);
        image.pixels_mut().set_normalized(2, 1.0);

        let lum = image.to_luminance().unwrap();
        assert_eq!(lum.color_space(), ColorSpace::Lum);
        assert_eq!(lum.num_bands(), 1);
        assert!((lum.pixels().get_normalized(0) - 1.0).abs() < 1e-5);

        assert!(matches!(
            lum.to_luminance(),
            Err(BundleError::IllegalArgument(_))
        ));
    }

    #[test]
    fn test_arithmetic() {
        let mut a = gradient(2, 2, PixelType::Float);
        let b = gradient(2, 2, PixelType::Float);
        let original = a.clone();

        a.add(&b).unwrap();
        a.scale(0.5).unwrap();
        assert!(a.equals_with_tolerance(&original, 1e-6));

        a.multiply(&b).unwrap();
        let expected = original.pixels().get_normalized(5).powi(2);
        assert!((a.pixels().get_normalized(5) - expected).abs() < 1e-6);

        // out-of-range float samples survive a native copy
        a.add_scalar(2.0).unwrap();
        let corner = a.crop(0, 0, 1, 1).unwrap();
        assert!(corner.pixels().get_normalized(0) > 1.0);
    }

    #[test]
    fn test_arithmetic_requires_float_storage() {
        let mut byte = gradient(2, 2, PixelType::Byte);
        assert!(matches!(byte.scale(2.0), Err(BundleError::IllegalArgument(_))));

        let mut float = gradient(2, 2, PixelType::Float);
        let other = gradient(2, 3, PixelType::Float);
        assert!(matches!(float.add(&other), Err(BundleError::IllegalArgument(_))));
    }

    #[test]
    fn test_raster_serialization() {
        let mut image = gradient(3, 2, PixelType::Float);
        image.header_mut().add_metadata("k", "v");

        let mut buf = Vec::new();
        image.write_to(&mut buf).unwrap();
        let parsed = RasterImage::read_from(&mut Cursor::new(buf), PixelType::Float).unwrap();
        assert_eq!(parsed, image);

        let byte = gradient(3, 2, PixelType::Byte);
        let mut buf = Vec::new();
        byte.write_to(&mut buf).unwrap();
        let parsed = RasterImage::read_from(&mut Cursor::new(buf), PixelType::Byte).unwrap();
        assert_eq!(parsed, byte);
    }

    #[test]
    fn test_display() {
        let image = gradient(2, 1, PixelType::Byte);
        let text = image.to_string();
        assert!(text.starts_with("ByteImage: 2 x 1 x 3 ["));
        assert!(text.contains("(0 1 2)"));
    }
}
