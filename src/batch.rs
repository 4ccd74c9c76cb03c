use image::RgbImage;
use ndarray::Array3;

/// One RGB frame: H×W×3 `f32` values in [0, 1], row-major.
pub type Frame = Array3<f32>;

/// An ordered batch of frames, indexed by position.
///
/// Frames are held as independent arrays rather than one 4-D tensor so
/// that a reloaded frame whose resolution differs from the rest of the
/// batch can still be carried through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageBatch {
    frames: Vec<Frame>,
}

impl ImageBatch {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn first(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }
}

impl FromIterator<Frame> for ImageBatch {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self { frames: iter.into_iter().collect() }
    }
}

/// Convert a [0, 1] float frame to an 8-bit RGB image, clipping out-of-range values.
pub fn frame_to_rgb(frame: &Frame) -> RgbImage {
    let (height, width, _) = frame.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let channel = |c: usize| {
            (frame[[y as usize, x as usize, c]] * 255.0).clamp(0.0, 255.0) as u8
        };
        image::Rgb([channel(0), channel(1), channel(2)])
    })
}

/// Convert an 8-bit RGB image back to a [0, 1] float frame.
pub fn rgb_to_frame(image: &RgbImage) -> Frame {
    let (width, height) = image.dimensions();
    let mut frame = Array3::<f32>::zeros((height as usize, width as usize, 3));
    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            frame[[y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
        }
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32, seed: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = |c: u32| ((x + y * width + seed + c) % 256) as u8;
            image::Rgb([v(0), v(1), v(2)])
        })
    }

    #[test]
    fn test_rgb_frame_round_trip() {
        let original = gradient_image(7, 5, 3);
        let frame = rgb_to_frame(&original);
        assert_eq!(frame.dim(), (5, 7, 3));
        assert_eq!(frame_to_rgb(&frame), original);
    }

    #[test]
    fn test_frame_to_rgb_clips_out_of_range() {
        let mut frame = Array3::<f32>::zeros((2, 2, 3));
        frame[[0, 0, 0]] = 1.5;
        frame[[1, 1, 2]] = -0.5;
        let image = frame_to_rgb(&frame);
        assert_eq!(image.get_pixel(0, 0)[0], 255);
        assert_eq!(image.get_pixel(1, 1)[2], 0);
    }

    #[test]
    fn test_batch_collect_preserves_order() {
        let frames: Vec<Frame> = (0..3)
            .map(|i| Array3::from_elem((2, 2, 3), i as f32 / 10.0))
            .collect();
        let batch: ImageBatch = frames.clone().into_iter().collect();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.frames(), frames.as_slice());
        assert_eq!(batch.get(1), frames.get(1));
    }
}
