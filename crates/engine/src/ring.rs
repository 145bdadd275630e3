// PCM ring buffer between the engine worker and the device callback

/// Fixed-capacity sample FIFO. One slot stays empty to tell full from empty.
pub struct AudioRingBuffer {
    buffer: Vec<f32>,
    write_pos: usize,
    read_pos: usize,
}

impl AudioRingBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(2)],
            write_pos: 0,
            read_pos: 0,
        }
    }

    pub fn write(&mut self, data: &[f32]) -> usize {
        let to_write = data.len().min(self.available_write());
        let size = self.buffer.len();

        // At most two contiguous runs around the wrap point
        let first = to_write.min(size - self.write_pos);
        self.buffer[self.write_pos..self.write_pos + first].copy_from_slice(&data[..first]);
        self.buffer[..to_write - first].copy_from_slice(&data[first..to_write]);

        self.write_pos = (self.write_pos + to_write) % size;
        to_write
    }

    pub fn read(&mut self, output: &mut [f32]) -> usize {
        let to_read = output.len().min(self.available_read());
        let size = self.buffer.len();

        let first = to_read.min(size - self.read_pos);
        output[..first].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + first]);
        output[first..to_read].copy_from_slice(&self.buffer[..to_read - first]);

        self.read_pos = (self.read_pos + to_read) % size;
        to_read
    }

    pub fn available_write(&self) -> usize {
        self.buffer.len() - self.available_read() - 1
    }

    pub fn available_read(&self) -> usize {
        if self.write_pos >= self.read_pos {
            self.write_pos - self.read_pos
        } else {
            self.buffer.len() - (self.read_pos - self.write_pos)
        }
    }

    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.read_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_around() {
        let mut ring = AudioRingBuffer::new(5);
        assert_eq!(ring.write(&[1.0, 2.0, 3.0]), 3);

        let mut out = [0.0; 2];
        assert_eq!(ring.read(&mut out), 2);
        assert_eq!(out, [1.0, 2.0]);

        assert_eq!(ring.write(&[4.0, 5.0, 6.0, 7.0]), 3);
        let mut out = [0.0; 8];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(&out[..4], &[3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_clear_drops_queued_samples() {
        let mut ring = AudioRingBuffer::new(8);
        ring.write(&[1.0; 4]);
        ring.clear();
        assert_eq!(ring.available_read(), 0);
        assert_eq!(ring.available_write(), 7);
    }
}
