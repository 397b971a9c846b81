use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

/// Renders `value` the way every file under the repository root is written:
/// four-space indentation and a trailing newline.
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    buffer.push(b'\n');
    Ok(buffer)
}

/// Writes `value` as JSON to `path` through a sibling temp file and a rename.
///
/// Readers of `path` observe either the previous complete file or the new
/// complete file. A failure before the rename leaves `path` untouched.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let contents = render_json(value)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".gamerepo-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(&contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_four_space_indented_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out.json");
        write_json_atomic(&path, &json!({ "title": "Game A" })).expect("write");
        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "{\n    \"title\": \"Game A\"\n}\n");
    }

    #[test]
    fn replaces_existing_file_and_leaves_no_temp_behind() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out.json");
        std::fs::write(&path, "old").expect("seed");
        write_json_atomic(&path, &json!([1, 2])).expect("write");
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(value, json!([1, 2]));
        let leftovers = std::fs::read_dir(temp.path())
            .expect("read dir")
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn missing_parent_fails_without_creating_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("absent").join("out.json");
        assert!(write_json_atomic(&path, &json!({})).is_err());
        assert!(!path.exists());
    }

    struct FailsHalfway;

    impl Serialize for FailsHalfway {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            use serde::ser::{Error, SerializeMap};

            let mut map = serializer.serialize_map(None)?;
            map.serialize_entry("title", "partial")?;
            Err(S::Error::custom("value could not be rendered"))
        }
    }

    #[test]
    fn serialization_failure_keeps_existing_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out.json");
        std::fs::write(&path, "{\n    \"title\": \"old\"\n}\n").expect("seed");

        let err = write_json_atomic(&path, &FailsHalfway).expect_err("serialization fails");
        assert!(err.to_string().contains("value could not be rendered"));
        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            "{\n    \"title\": \"old\"\n}\n"
        );
        let names: Vec<_> = std::fs::read_dir(temp.path())
            .expect("read dir")
            .flatten()
            .map(|entry| entry.file_name())
            .collect();
        assert_eq!(names, ["out.json"]);
    }
}
