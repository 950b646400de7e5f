//! Line-oriented reading and JSON-lines writing.
//!
//! Files whose name ends in `.gz` are transparently gzip-decompressed
//! on reading and compressed on writing.

use std::{
    fs,
    io::{self, BufRead, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use flate2::{read::MultiGzDecoder, write::GzEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Errors from line-oriented I/O.
#[derive(Debug, Error)]
pub enum LinesError {
    #[error("failed to open '{}'", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("failed to (de)serialize record")]
    Json(#[from] serde_json::Error),
}

/// A buffered reader over a file that may be gzip-compressed.
pub type FileReader = Box<dyn BufRead + Send>;

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

fn open_error(path: &Path) -> impl FnOnce(io::Error) -> LinesError + '_ {
    move |source| LinesError::Open {
        path: path.to_owned(),
        source,
    }
}

/// Opens the file at `path` for buffered reading.
pub fn open_reader(path: impl AsRef<Path>) -> Result<FileReader, LinesError> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(open_error(path))?;

    Ok(if is_gzip(path) {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    })
}

/// A file opened for writing, compressed when its name ends in `.gz`.
///
/// Call [`FileWriter::finish`] once done; dropping the writer loses
/// any error from writing out the final bytes.
pub enum FileWriter {
    Plain(BufWriter<fs::File>),
    Gzip(GzEncoder<BufWriter<fs::File>>),
}

impl FileWriter {
    /// Creates or truncates the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, LinesError> {
        let path = path.as_ref();
        let file = BufWriter::new(fs::File::create(path).map_err(open_error(path))?);

        Ok(if is_gzip(path) {
            Self::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Self::Plain(file)
        })
    }

    /// Writes out all buffered data and the gzip trailer, if any.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut w) => w.flush(),
            Self::Gzip(w) => w.finish()?.flush(),
        }
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

/// An iterator over the lines of a reader, without line terminators.
///
/// Created by [`read_lines`] and [`open_lines`].
pub struct Lines<R> {
    inner: io::Lines<R>,
    remaining: Option<usize>,
}

/// Reads up to `limit` lines from `reader`.
pub fn read_lines<R: BufRead>(reader: R, limit: Option<usize>) -> Lines<R> {
    Lines {
        inner: reader.lines(),
        remaining: limit,
    }
}

/// Opens the file at `path` and reads up to `limit` lines from it.
pub fn open_lines(
    path: impl AsRef<Path>,
    limit: Option<usize>,
) -> Result<Lines<FileReader>, LinesError> {
    Ok(read_lines(open_reader(path)?, limit))
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.remaining {
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                self.inner.next()
            }
            None => self.inner.next(),
        }
    }
}

/// An iterator over the lines of every file in a directory.
///
/// Created by [`open_dir_lines`].
pub struct DirLines {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<Lines<FileReader>>,
    remaining: Option<usize>,
}

/// Reads up to `limit` lines from the files in `dir`, one file after
/// the other in file name order.
///
/// Subdirectories are skipped. A file that fails to open yields an
/// error in its place and reading continues with the next one.
pub fn open_dir_lines(
    dir: impl AsRef<Path>,
    limit: Option<usize>,
) -> Result<DirLines, LinesError> {
    let dir = dir.as_ref();

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(open_error(dir))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    Ok(DirLines {
        files: files.into_iter(),
        current: None,
        remaining: limit,
    })
}

impl Iterator for DirLines {
    type Item = Result<String, LinesError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }

        loop {
            if let Some(line) = self.current.as_mut().and_then(|lines| lines.next()) {
                if let Some(n) = &mut self.remaining {
                    *n -= 1;
                }
                return Some(line.map_err(LinesError::from));
            }

            let path = self.files.next()?;
            match open_lines(&path, None) {
                Ok(lines) => self.current = Some(lines),
                Err(e) => {
                    self.current = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Parses JSON-lines records from `reader`.
///
/// The first `skip` lines are passed over without being parsed, then
/// up to `limit` records are decoded.
pub fn parse_jsonl<T, R>(
    reader: R,
    skip: usize,
    limit: Option<usize>,
) -> impl Iterator<Item = Result<T, LinesError>>
where
    T: DeserializeOwned,
    R: BufRead,
{
    reader
        .lines()
        .skip(skip)
        .take(limit.unwrap_or(usize::MAX))
        .map(|line| -> Result<T, LinesError> { Ok(serde_json::from_str(&line?)?) })
}

/// Opens the file at `path` and parses JSON-lines records from it.
///
/// See [`parse_jsonl`] for the meaning of `skip` and `limit`.
pub fn read_jsonl<T: DeserializeOwned>(
    path: impl AsRef<Path>,
    skip: usize,
    limit: Option<usize>,
) -> Result<impl Iterator<Item = Result<T, LinesError>>, LinesError> {
    Ok(parse_jsonl(open_reader(path)?, skip, limit))
}

/// Writes every record as one line of compact JSON.
///
/// Returns the number of records written.
pub fn write_jsonl<W, T, I>(mut writer: W, records: I) -> Result<usize, LinesError>
where
    W: Write,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut count = 0;
    for record in records {
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

/// Writes every string as its own line.
pub fn write_lines<W, S, I>(mut writer: W, lines: I) -> Result<usize, LinesError>
where
    W: Write,
    S: AsRef<str>,
    I: IntoIterator<Item = S>,
{
    let mut count = 0;
    for line in lines {
        writer.write_all(line.as_ref().as_bytes())?;
        writer.write_all(b"\n")?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

/// Like [`write_jsonl`], but into a freshly created file at `path`.
pub fn write_jsonl_file<T, I>(path: impl AsRef<Path>, records: I) -> Result<usize, LinesError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut file = FileWriter::create(path)?;
    let count = write_jsonl(&mut file, records)?;
    file.finish()?;

    Ok(count)
}

/// Like [`write_lines`], but into a freshly created file at `path`.
pub fn write_lines_file<S, I>(path: impl AsRef<Path>, lines: I) -> Result<usize, LinesError>
where
    S: AsRef<str>,
    I: IntoIterator<Item = S>,
{
    let mut file = FileWriter::create(path)?;
    let count = write_lines(&mut file, lines)?;
    file.finish()?;

    Ok(count)
}

/// Reads the full contents of a possibly compressed file as a string.
pub fn read_to_string(path: impl AsRef<Path>) -> Result<String, LinesError> {
    let mut contents = String::new();
    open_reader(path)?.read_to_string(&mut contents)?;

    Ok(contents)
}
