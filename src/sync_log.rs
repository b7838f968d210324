use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

/// Whitespace field holding the JPEG file name.
const FILE_NAME_FIELD: usize = 1;
/// Whitespace field holding the GPS seconds of week.
const SECONDS_FIELD: usize = 12;

/// Separator between the original record and the appended timestamp.
const TIMESTAMP_PAD: &str = "    ";

/// One CameraSync line, tokenized.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRecord<'a> {
    pub file_name: &'a str,
    pub seconds_of_week: f64,
}

impl<'a> SyncRecord<'a> {
    /// `line_no` is 1-based and only used for error messages.
    pub fn parse(line: &'a str, line_no: u64) -> anyhow::Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() <= SECONDS_FIELD {
            bail!(
                "CameraSync line {}: expected at least {} fields, found {}",
                line_no,
                SECONDS_FIELD + 1,
                fields.len()
            );
        }

        let raw = fields[SECONDS_FIELD];
        let seconds_of_week = raw
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite())
            .with_context(|| format!("CameraSync line {}: bad seconds of week {:?}", line_no, raw))?;

        Ok(Self {
            file_name: fields[FILE_NAME_FIELD],
            seconds_of_week,
        })
    }
}

/// The input CameraSync file, counted and rewound.
pub struct SyncReader {
    path: PathBuf,
    reader: BufReader<File>,
    total: u64,
    buf: Vec<u8>,
}

impl SyncReader {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| path.display().to_string())?;
        let mut reader = BufReader::new(file);

        let total = count_records(&mut reader).with_context(|| path.display().to_string())?;
        reader
            .seek(SeekFrom::Start(0))
            .with_context(|| path.display().to_string())?;

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            total,
            buf: Vec::new(),
        })
    }

    /// Number of records counted when the file was opened.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Next line without its terminator, or `None` at end of file.
    pub fn next_line(&mut self) -> anyhow::Result<Option<&[u8]>> {
        self.buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .with_context(|| self.path.display().to_string())?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(strip_terminator(&self.buf)))
    }
}

/// Count lines, including a final line that lacks a newline.
pub fn count_records<R: BufRead>(reader: &mut R) -> io::Result<u64> {
    let mut count = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(count);
        }
        count += 1;
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Text view of a raw line for tokenizing. The raw bytes are what gets written.
pub fn decode_line(line: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(line)
}

/// The `_T.dat` output file.
pub struct SyncWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl SyncWriter {
    /// Create the output file, making its folder first if needed.
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| dir.display().to_string())?;
        }
        let file = File::create(path).with_context(|| path.display().to_string())?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Write the original line followed by the timestamp in microseconds.
    pub fn write_record(&mut self, line: &[u8], picture_time: i64) -> anyhow::Result<()> {
        self.writer
            .write_all(line)
            .and_then(|_| writeln!(self.writer, "{}{}", TIMESTAMP_PAD, picture_time))
            .with_context(|| self.path.display().to_string())
    }

    pub fn finish(mut self) -> anyhow::Result<()> {
        self.writer
            .flush()
            .with_context(|| self.path.display().to_string())
    }
}
