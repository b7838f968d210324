use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

/// Marker in the LiDAR data folder name that becomes `INDEXED_MARKER`
/// in the indexed camera folder name.
const DATA_MARKER: &str = "LD";
const INDEXED_MARKER: &str = "DC";

/// Underscore fields of a folder base name holding the dataset date and time.
const DATE_FIELD: usize = 3;
const TIME_FIELD: usize = 4;
/// Last field of the wide identifier used in CameraSync file names.
const WIDE_LAST_FIELD: usize = 5;

/// Dataset date/time pair taken from a folder base name (e.g. `220301_093000`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetId {
    pub date: String,
    pub time: String,
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.date, self.time)
    }
}

/// Everything derived from the two folder arguments.
#[derive(Debug, Clone)]
pub struct DatasetFolders {
    pub camera_folder: PathBuf,
    /// Output folder: the data folder with its last `LD` replaced by `DC`.
    pub indexed_folder: PathBuf,
    pub camera_id: DatasetId,
    /// Fields 3..=5 of the data folder name, for the output sync file.
    pub data_wide_id: String,
    /// Fields 3..=5 of the camera folder name, for the input sync file.
    pub camera_wide_id: String,
}

impl DatasetFolders {
    /// Resolve the output folder and check that both folders belong to the
    /// same dataset.
    pub fn resolve(data_folder: &Path, camera_folder: &Path) -> anyhow::Result<Self> {
        let indexed_folder = indexed_camera_folder(data_folder)?;

        let data_name = base_name(data_folder)?;
        let camera_name = base_name(camera_folder)?;

        let data_id = dataset_id(data_name)
            .with_context(|| format!("Data folder: {}", data_folder.display()))?;
        let camera_id = dataset_id(camera_name)
            .with_context(|| format!("Camera folder: {}", camera_folder.display()))?;

        if data_id != camera_id {
            bail!(
                "data and camera folder dates/times do not match!\nData folder: {}\nCamera folder: {}",
                data_id,
                camera_id
            );
        }

        Ok(Self {
            camera_folder: camera_folder.to_path_buf(),
            indexed_folder,
            camera_id,
            data_wide_id: wide_id(data_name),
            camera_wide_id: wide_id(camera_name),
        })
    }

    /// `<camera_folder>/CameraSync_<camera wide id>_0.dat`
    pub fn sync_input_path(&self) -> PathBuf {
        self.camera_folder
            .join(format!("CameraSync_{}_0.dat", self.camera_wide_id))
    }

    /// `<indexed_folder>/CameraSync_<data wide id>_T.dat`
    pub fn sync_output_path(&self) -> PathBuf {
        self.indexed_folder
            .join(format!("CameraSync_{}_T.dat", self.data_wide_id))
    }

    pub fn image_path(&self, file_name: &str) -> PathBuf {
        self.camera_folder.join(file_name)
    }

    /// The YYMMDD token of the camera folder name.
    pub fn date_token(&self) -> &str {
        &self.camera_id.date
    }
}

/// Replace the last `LD` in the data folder path with `DC`.
pub fn indexed_camera_folder(data_folder: &Path) -> anyhow::Result<PathBuf> {
    let path = data_folder
        .to_str()
        .with_context(|| format!("{} is not valid UTF-8", data_folder.display()))?;

    let Some(pos) = path.rfind(DATA_MARKER) else {
        bail!(
            "data folder {} does not contain the \"{}\" marker",
            path,
            DATA_MARKER
        );
    };

    let mut indexed = String::with_capacity(path.len());
    indexed.push_str(&path[..pos]);
    indexed.push_str(INDEXED_MARKER);
    indexed.push_str(&path[pos + DATA_MARKER.len()..]);
    Ok(PathBuf::from(indexed))
}

fn base_name(folder: &Path) -> anyhow::Result<&str> {
    folder
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable folder name", folder.display()))
}

/// Underscore fields `start..=end` of `name`, clamped to the fields present.
/// `None` when `start` is past the last field.
pub fn section(name: &str, start: usize, end: usize) -> Option<String> {
    let fields: Vec<&str> = name.split('_').collect();
    if start >= fields.len() {
        return None;
    }
    let end = end.min(fields.len() - 1);
    Some(fields[start..=end].join("_"))
}

pub fn dataset_id(name: &str) -> anyhow::Result<DatasetId> {
    let fields: Vec<&str> = name.split('_').collect();
    if fields.len() <= TIME_FIELD {
        bail!(
            "folder name {} has no date/time fields (expected at least {} '_' separated fields)",
            name,
            TIME_FIELD + 1
        );
    }
    Ok(DatasetId {
        date: fields[DATE_FIELD].to_string(),
        time: fields[TIME_FIELD].to_string(),
    })
}

/// Only called once `dataset_id` has succeeded, so the date field exists.
fn wide_id(name: &str) -> String {
    section(name, DATE_FIELD, WIDE_LAST_FIELD).unwrap_or_default()
}
