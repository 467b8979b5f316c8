#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use imgpilot::error::UploadError;
use imgpilot::remote::{ExecOutput, RemoteHost, Transport};
use imgpilot::secrets::SshSecrets;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Open(PathBuf),
    MakeDir(String),
    Copy(String),
    Exec(String),
}

pub type ImportHook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct MockTransport {
    pub ops: Arc<Mutex<Vec<Op>>>,
    /// archives whose import script exits non-zero
    pub fail_import: Vec<String>,
    /// called with the remote archive path when its import script runs
    pub on_import: Option<ImportHook>,
}

struct MockHost {
    ops: Arc<Mutex<Vec<Op>>>,
    fail_import: Vec<String>,
    on_import: Option<ImportHook>,
}

impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn open(&self, _secrets: &SshSecrets, key: &Path) -> Result<Box<dyn RemoteHost>, UploadError> {
        assert!(key.exists(), "key file must exist while the host is open");
        self.ops.lock().unwrap().push(Op::Open(key.to_path_buf()));
        Ok(Box::new(MockHost {
            ops: self.ops.clone(),
            fail_import: self.fail_import.clone(),
            on_import: self.on_import.clone(),
        }))
    }
}

impl RemoteHost for MockHost {
    fn make_dir(&mut self, dir: &str) -> Result<(), UploadError> {
        self.ops.lock().unwrap().push(Op::MakeDir(dir.to_string()));
        Ok(())
    }

    fn copy_file(&mut self, _local: &Path, remote: &str) -> Result<(), UploadError> {
        self.ops.lock().unwrap().push(Op::Copy(remote.to_string()));
        Ok(())
    }

    fn exec(&mut self, command: &str) -> Result<ExecOutput, UploadError> {
        self.ops.lock().unwrap().push(Op::Exec(command.to_string()));
        let ops = self.ops.lock().unwrap();
        let copied = ops.iter().rev().find_map(|op| match op {
            Op::Copy(r) if r.ends_with(".zip") => Some(r.clone()),
            _ => None,
        });
        let is_import = command.starts_with("bash ");
        if is_import
            && let (Some(hook), Some(archive)) = (&self.on_import, &copied)
        {
            hook(archive);
        }
        let fails = is_import
            && copied.is_some_and(|r| self.fail_import.iter().any(|f| r.ends_with(f.as_str())));
        Ok(ExecOutput {
            status: if fails { 1 } else { 0 },
            stdout: "Success: Imported file".into(),
            stderr: String::new(),
        })
    }
}

pub fn write_zip(path: &Path, images: usize) {
    let file = std::fs::File::create(path).unwrap();
    let mut zw = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default();
    for i in 0..images {
        zw.start_file(format!("img{}.webp", i), opts).unwrap();
        zw.write_all(b"x").unwrap();
    }
    zw.start_file("readme.txt", opts).unwrap();
    zw.finish().unwrap();
}
