use anyhow::Context;
use std::{
    io::ErrorKind,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
    time::Instant,
};

type FromRecord<T> = fn(&csv::StringRecord) -> anyhow::Result<T>;
type ToRecord<T> = fn(&T) -> Vec<String>;
type IdOf<T> = fn(&T) -> u64;

/// A CSV file held in memory.
///
/// Rows are loaded once; every `save` rewrites the whole file through a
/// temporary file and a rename so readers never see a partial table.
#[derive(Clone)]
pub struct Table<T> {
    rows: Arc<RwLock<Vec<T>>>,
    path: String,
    headers: &'static [&'static str],
    to_record: ToRecord<T>,

    // highest id ever handed out, persisted in `<path>.seq`
    last_id: Option<Arc<AtomicU64>>,
}

impl<T> Table<T> {
    pub fn load(
        path: &str,
        headers: &'static [&'static str],
        from_record: FromRecord<T>,
        to_record: ToRecord<T>,
    ) -> anyhow::Result<Self> {
        if let Err(err) = std::fs::metadata(path) {
            match err.kind() {
                ErrorKind::NotFound => {
                    log::info!("Creating new table at {path}");
                    let mut csv_wrt = csv::Writer::from_path(path)?;
                    csv_wrt.write_record(headers)?;
                    csv_wrt.flush()?;
                }
                _ => Err(err)?,
            }
        }

        let now = Instant::now();
        let mut csv_reader = csv::Reader::from_path(path)?;

        let mut rows = vec![];
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let row = from_record(&record)
                .with_context(|| format!("{path}: malformed record {}", line + 1))?;
            rows.push(row);
        }

        log::debug!(
            "took {}ms to read {path}",
            now.elapsed().as_micros() as f64 / 1000.0
        );

        Ok(Table {
            rows: Arc::new(RwLock::new(rows)),
            path: path.to_string(),
            headers,
            to_record,
            last_id: None,
        })
    }

    /// Hand out ids from a high-water mark kept in `<path>.seq`.
    ///
    /// The mark starts at the larger of the stored value and the highest id
    /// in the table, so ids of deleted rows are never reused.
    pub fn with_ids(mut self, id_of: IdOf<T>) -> anyhow::Result<Self> {
        let seq_path = self.seq_path();
        let stored = match std::fs::read_to_string(&seq_path) {
            Ok(content) => content
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{seq_path}: malformed id sequence"))?,
            Err(err) if err.kind() == ErrorKind::NotFound => 0,
            Err(err) => Err(err).context(format!("couldnt read {seq_path}"))?,
        };

        let highest = self.read().iter().map(id_of).max().unwrap_or(0);
        self.last_id = Some(Arc::new(AtomicU64::new(stored.max(highest))));

        Ok(self)
    }

    /// Next unused id, starting at 1. Persisted with the next `save`.
    pub fn next_id(&self) -> anyhow::Result<u64> {
        let last_id = self
            .last_id
            .as_ref()
            .ok_or(anyhow::anyhow!("{} has no id sequence", self.path))?;

        Ok(last_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn seq_path(&self) -> String {
        format!("{}.seq", &self.path)
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write every row back to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        // the write guard serialises concurrent saves on the temp file
        let rows = self.write();

        let temp_path = format!("{}-tmp", &self.path);
        let mut csv_wrt = csv::Writer::from_path(&temp_path)?;
        csv_wrt.write_record(self.headers)?;
        for row in rows.iter() {
            csv_wrt.write_record((self.to_record)(row))?;
        }
        csv_wrt.flush()?;
        std::fs::rename(&temp_path, &self.path)?;

        if let Some(last_id) = &self.last_id {
            std::fs::write(self.seq_path(), last_id.load(Ordering::SeqCst).to_string())?;
        }

        Ok(())
    }
}
