use polars::prelude::*;

use crate::acquisition::{LogicPacket, LogicSink};

const BITMAP_COLUMN_NAME: &str = "bitmap";
const TIME_COLUMN_NAME: &str = "time";

/// In-memory consumer that accumulates one acquisition's packets and can
/// convert the capture into a DataFrame for analysis.
///
/// The time column is derived from the sample index and the capture's
/// sample rate, so the rate handed to [`new`](Self::new) should be the one
/// the session was started with.
#[derive(Debug)]
pub struct LogicCapture {
    samplerate: u64,
    unit_size: usize,
    data: Vec<u8>,
    completed: bool,
}

impl LogicCapture {
    pub fn new(samplerate: u64) -> Self {
        Self {
            samplerate,
            unit_size: 2,
            data: Vec::new(),
            completed: false,
        }
    }

    pub fn sample_count(&self) -> usize {
        if self.unit_size == 0 {
            return 0;
        }
        self.data.len() / self.unit_size
    }

    /// True once `end_stream` has been observed.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// The raw packed samples captured so far.
    pub fn samples(&self) -> Vec<u16> {
        self.data
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    /// Capture as a DataFrame of (time, bitmap) rows, time in seconds from
    /// the first sample.
    pub fn to_dataframe(&self) -> Result<DataFrame, PolarsError> {
        let bitmaps: Vec<u32> = self.samples().into_iter().map(u32::from).collect();

        let df = DataFrame::new(vec![Series::new(BITMAP_COLUMN_NAME.into(), bitmaps).into()])?;
        df.lazy()
            .with_row_index("row_index", Some(0))
            .with_columns([(col("row_index").cast(DataType::Float64)
                * lit(1.0 / self.samplerate as f64))
            .alias(TIME_COLUMN_NAME)])
            .select([col(TIME_COLUMN_NAME), col(BITMAP_COLUMN_NAME)])
            .collect()
    }

    /// Extract per-channel boolean columns from the bitmap column.
    pub fn extract_bits(mut df: &mut DataFrame, channels: u16) -> Result<&DataFrame, PolarsError> {
        let bitmap_column = df.column(BITMAP_COLUMN_NAME)?;
        let bitmaps = bitmap_column.u32()?;

        let mut bit_columns: Vec<Vec<bool>> = vec![Vec::new(); channels as usize];
        for bitmap in bitmaps.into_iter() {
            let bitmap = bitmap.unwrap_or(0);
            for (bit, column) in bit_columns.iter_mut().enumerate() {
                column.push((bitmap >> bit) & 1 == 1);
            }
        }

        for (bit, values) in bit_columns.into_iter().enumerate() {
            let column: Column = Series::new(format!("bit_{}", bit).into(), values).into();
            df = df.with_column(column)?;
        }

        Ok(df)
    }
}

impl LogicSink for LogicCapture {
    fn begin_stream(&mut self) {
        self.data.clear();
        self.completed = false;
    }

    fn logic_samples(&mut self, packet: &LogicPacket<'_>) {
        self.unit_size = packet.unit_size;
        self.data.extend_from_slice(packet.data);
    }

    fn end_stream(&mut self) {
        self.completed = true;
        log::debug!("capture complete, {} samples", self.sample_count());
    }
}
