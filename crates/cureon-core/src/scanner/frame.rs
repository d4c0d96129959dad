/// Reusable RGBA frame. Reallocated only when the stream size changes.
#[derive(Debug, Default, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    const BYTES_PER_PIXEL: usize = 4;

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resize for a `width`x`height` frame. Returns true if it reallocated.
    pub fn ensure_size(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width as usize * height as usize * Self::BYTES_PER_PIXEL];
        true
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_only_on_change() {
        let mut frame = FrameBuffer::default();
        assert!(frame.ensure_size(640, 480));
        assert_eq!(frame.pixels().len(), 640 * 480 * 4);

        frame.pixels_mut()[0] = 9;
        assert!(!frame.ensure_size(640, 480));
        assert_eq!(frame.pixels()[0], 9);

        assert!(frame.ensure_size(1280, 720));
        assert_eq!((frame.width(), frame.height()), (1280, 720));
        assert_eq!(frame.pixels().len(), 1280 * 720 * 4);
    }
}
