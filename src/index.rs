use crate::downsample;
use crate::folders::DatasetFolders;
use crate::gps_time::GpsTimeReconstructor;
use crate::progress::{PercentProgress, ProgressCallback};
use crate::sync_log::{self, SyncReader, SyncRecord, SyncWriter};

/// Outcome of one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub records: u64,
    pub images_scaled: u64,
    pub images_skipped: u64,
    /// The records crossed a GPS week boundary.
    pub week_rollover: bool,
}

/// Scale every image named in the CameraSync file and write the
/// timestamped copy of the file into the indexed camera folder.
///
/// `program` prefixes per-image warnings.
pub fn build_index(
    folders: &DatasetFolders,
    program: &str,
    progress_callback: &ProgressCallback,
) -> anyhow::Result<IndexSummary> {
    let mut reader = SyncReader::open(&folders.sync_input_path())?;
    let total = reader.total();

    // Also creates the indexed folder the scaled images go into.
    let mut writer = SyncWriter::create(&folders.sync_output_path())?;

    let mut clock = GpsTimeReconstructor::new(folders.date_token());
    let mut progress = PercentProgress::new(progress_callback, total);
    let mut summary = IndexSummary::default();

    while let Some(line) = reader.next_line()? {
        let line_no = summary.records + 1;
        let text = sync_log::decode_line(line);
        let record = SyncRecord::parse(&text, line_no)?;

        let jpg_file = folders.image_path(record.file_name);
        match downsample::downsample(&jpg_file, &folders.indexed_folder) {
            Ok(_) => summary.images_scaled += 1,
            Err(e) => {
                eprintln!("{} - {} - {:#}", program, jpg_file.display(), e);
                summary.images_skipped += 1;
            }
        }

        let picture_time = clock.picture_time(record.seconds_of_week)?;
        writer.write_record(line, picture_time)?;

        summary.records += 1;
        progress.report(summary.records);
    }

    writer.finish()?;
    progress.finish();
    summary.week_rollover = clock.rolled_over();

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps_time::SECONDS_PER_WEEK;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    // 2022-02-27 00:00:00 GMT, the GPS week start for 220301.
    const ANCHOR: i64 = 1_645_920_000;

    fn sync_line(file_name: &str, seconds: &str) -> String {
        format!("0 {} 1 2 3 4 5 6 7 8 9 10 {}", file_name, seconds)
    }

    fn dataset(root: &Path, lines: &[String]) -> DatasetFolders {
        let data = root.join("CZ_LD_A_220301_093000_1");
        let camera = root.join("CZ_CAM_A_220301_093000_1");
        fs::create_dir_all(&data).unwrap();
        fs::create_dir_all(&camera).unwrap();

        let mut text = lines.join("\n");
        text.push('\n');
        fs::write(camera.join("CameraSync_220301_093000_1_0.dat"), text).unwrap();

        DatasetFolders::resolve(&data, &camera).unwrap()
    }

    fn output_lines(folders: &DatasetFolders) -> Vec<String> {
        fs::read_to_string(folders.sync_output_path())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn timestamp(line: &str) -> i64 {
        line.rsplit("    ").next().unwrap().parse().unwrap()
    }

    #[test]
    fn test_index_scales_images_and_timestamps_records() {
        let dir = tempdir().unwrap();
        let lines = vec![
            sync_line("IMG_0001.jpg", "12345.678900"),
            sync_line("IMG_0002.jpg", "12346.5"),
        ];
        let folders = dataset(dir.path(), &lines);
        RgbImage::from_pixel(640, 480, Rgb([10, 20, 30]))
            .save(folders.camera_folder.join("IMG_0001.jpg"))
            .unwrap();
        RgbImage::from_pixel(300, 400, Rgb([200, 20, 30]))
            .save(folders.camera_folder.join("IMG_0002.jpg"))
            .unwrap();

        let seen = RefCell::new(Vec::new());
        let cb = |p: u32| seen.borrow_mut().push(p);
        let summary = build_index(&folders, "test", &cb).unwrap();

        assert_eq!(
            summary,
            IndexSummary { records: 2, images_scaled: 2, images_skipped: 0, week_rollover: false }
        );
        assert_eq!(seen.into_inner(), vec![50, 100, 100]);

        let out = output_lines(&folders);
        assert_eq!(out.len(), 2);
        for (input, output) in lines.iter().zip(&out) {
            assert!(output.starts_with(&format!("{}    ", input)));
        }
        assert_eq!(
            timestamp(&out[0]),
            ((ANCHOR as f64 + 12345.6789) * 1e6).round() as i64
        );
        assert_eq!(timestamp(&out[1]), (ANCHOR * 1_000_000) + 12_346_500_000);

        let first = image::open(folders.indexed_folder.join("IMG_0001_scaled.jpeg")).unwrap();
        assert_eq!(first.dimensions(), (1024, 768));
        let second = image::open(folders.indexed_folder.join("IMG_0002_scaled.jpeg")).unwrap();
        assert_eq!(second.dimensions(), (1024, 1365));
    }

    #[test]
    fn test_missing_image_still_writes_record() {
        let dir = tempdir().unwrap();
        let lines = vec![sync_line("IMG_0404.jpg", "100.0")];
        let folders = dataset(dir.path(), &lines);

        let summary = build_index(&folders, "test", &|_: u32| {}).unwrap();
        assert_eq!(summary.images_skipped, 1);
        assert_eq!(summary.images_scaled, 0);

        let out = output_lines(&folders);
        assert_eq!(out.len(), 1);
        assert_eq!(timestamp(&out[0]), (ANCHOR + 100) * 1_000_000);
        assert!(!folders.indexed_folder.join("IMG_0404_scaled.jpeg").exists());
    }

    #[test]
    fn test_week_rollover_across_records() {
        let dir = tempdir().unwrap();
        let lines = vec![
            sync_line("a.jpg", "604790.0"),
            sync_line("b.jpg", "5.0"),
            sync_line("c.jpg", "7.25"),
        ];
        let folders = dataset(dir.path(), &lines);

        let summary = build_index(&folders, "test", &|_: u32| {}).unwrap();
        assert!(summary.week_rollover);
        let stamps: Vec<i64> = output_lines(&folders).iter().map(|l| timestamp(l)).collect();

        let week_us = SECONDS_PER_WEEK * 1_000_000;
        assert_eq!(stamps[0], (ANCHOR + 604_790) * 1_000_000);
        assert_eq!(stamps[1], (ANCHOR + 5) * 1_000_000 + week_us);
        assert_eq!(stamps[2], (ANCHOR * 1_000_000) + 7_250_000 + week_us);
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_empty_sync_file() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("CZ_LD_A_220301_093000_1");
        let camera = dir.path().join("CZ_CAM_A_220301_093000_1");
        fs::create_dir_all(&camera).unwrap();
        fs::write(camera.join("CameraSync_220301_093000_1_0.dat"), "").unwrap();
        let folders = DatasetFolders::resolve(&data, &camera).unwrap();

        let seen = RefCell::new(Vec::new());
        let cb = |p: u32| seen.borrow_mut().push(p);
        let summary = build_index(&folders, "test", &cb).unwrap();

        assert_eq!(summary.records, 0);
        assert_eq!(seen.into_inner(), vec![100]);
        assert_eq!(fs::read_to_string(folders.sync_output_path()).unwrap(), "");
    }

    #[test]
    fn test_missing_sync_file_is_fatal() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("CZ_LD_A_220301_093000_1");
        let camera = dir.path().join("CZ_CAM_A_220301_093000_1");
        let folders = DatasetFolders::resolve(&data, &camera).unwrap();

        let err = build_index(&folders, "test", &|_: u32| {}).unwrap_err();
        assert!(format!("{:#}", err).contains("CameraSync_220301_093000_1_0.dat"));
        assert!(!folders.sync_output_path().exists());
    }

    #[test]
    fn test_malformed_record_truncates_output() {
        let dir = tempdir().unwrap();
        let lines = vec![sync_line("a.jpg", "1.0"), "0 b.jpg 1 2".to_string()];
        let folders = dataset(dir.path(), &lines);

        let err = build_index(&folders, "test", &|_: u32| {}).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
