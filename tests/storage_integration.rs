//! Integration tests for download directory lifecycle

use tableau_workbook_migrator::DownloadDir;
use tempfile::TempDir;

#[test]
fn test_user_directory_survives_with_contents() {
    let base = TempDir::new().unwrap();
    let target = base.path().join("exports");
    let file;

    {
        let downloads = DownloadDir::new(Some(target.clone())).unwrap();
        file = downloads.path().join("Sales.twbx");
        std::fs::write(&file, b"workbook").unwrap();

        // A user-supplied directory never has its files reaped
        downloads.remove_file_if_managed(&file);
        assert!(file.exists());
    }

    assert!(target.exists());
    assert!(file.exists());
}

#[test]
fn test_managed_directory_reaps_files_and_itself() {
    let path;
    {
        let downloads = DownloadDir::new(None).unwrap();
        path = downloads.path().to_path_buf();

        let file = downloads.path().join("Sales.twbx");
        std::fs::write(&file, b"workbook").unwrap();
        downloads.remove_file_if_managed(&file);
        assert!(!file.exists());
    }

    assert!(!path.exists());
}

#[test]
fn test_nested_user_directory_is_created() {
    let base = TempDir::new().unwrap();
    let target = base.path().join("a").join("b").join("downloads");

    let downloads = DownloadDir::new(Some(target.clone())).unwrap();
    assert!(target.exists());
    assert_eq!(downloads.path(), target.as_path());
}
