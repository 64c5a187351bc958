//! Keeping the proto-code equal to the installed kernel.
//!
//! Once the venv holds a kernel (`<venv>/bin/protoprimer`), the proto-code
//! committed under the ref-root is rewritten from it. Script kernels keep
//! their shebang and gain a generated-file note on the second line; binary
//! kernels are copied byte for byte. Content is compared by blake3 digest and
//! written atomically with the kernel's permissions.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::RelayError;
use crate::python::{same_path, venv_executable};

/// Executable name of the kernel installed into the venv.
pub const KERNEL_EXE_NAME: &str = "protoprimer";

/// Where the installed kernel lives in `venv_dir`.
pub fn installed_kernel(venv_dir: &Path) -> PathBuf {
    venv_executable(venv_dir, KERNEL_EXE_NAME)
}

/// Sync of one proto-code file from one kernel.
#[derive(Debug, Clone)]
pub struct ProtoCodeSync {
    kernel: PathBuf,
    proto_code: PathBuf,
}

impl ProtoCodeSync {
    pub fn new(kernel: impl Into<PathBuf>, proto_code: impl Into<PathBuf>) -> Self {
        ProtoCodeSync {
            kernel: kernel.into(),
            proto_code: proto_code.into(),
        }
    }

    pub fn kernel(&self) -> &Path {
        &self.kernel
    }

    /// Whether `kernel` and `proto_code` are the same file.
    pub fn is_self(&self) -> bool {
        same_path(&self.kernel, &self.proto_code)
    }

    /// Expected proto-code content.
    pub fn render(&self) -> Result<Vec<u8>, RelayError> {
        let kernel = fs::read(&self.kernel).map_err(RelayError::io(&self.kernel))?;
        Ok(render_proto_code(&kernel, &self.kernel))
    }

    /// Whether the proto-code already matches the rendered kernel.
    pub fn is_current(&self) -> Result<bool, RelayError> {
        if self.is_self() {
            return Ok(true);
        }
        let expected = self.render()?;
        Ok(digest_file(&self.proto_code)? == Some(blake3::hash(&expected)))
    }

    /// Rewrites the proto-code when it differs. Returns whether it was written.
    pub fn update(&self) -> Result<bool, RelayError> {
        if self.is_self() {
            return Ok(false);
        }
        let expected = self.render()?;
        if digest_file(&self.proto_code)? == Some(blake3::hash(&expected)) {
            tracing::debug!(proto_code = %self.proto_code.display(), "proto-code is current");
            return Ok(false);
        }
        self.write_atomically(&expected)?;
        tracing::info!(
            proto_code = %self.proto_code.display(),
            kernel = %self.kernel.display(),
            "updated proto-code"
        );
        Ok(true)
    }

    fn write_atomically(&self, content: &[u8]) -> Result<(), RelayError> {
        let dir = self
            .proto_code
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let io_err = RelayError::io(&self.proto_code);
        let write = || -> io::Result<()> {
            let mut temp = NamedTempFile::new_in(dir)?;
            temp.write_all(content)?;
            temp.flush()?;
            let permissions = fs::metadata(&self.kernel)?.permissions();
            fs::set_permissions(temp.path(), permissions)?;
            temp.persist(&self.proto_code).map_err(|err| err.error)?;
            Ok(())
        };
        write().map_err(io_err)
    }
}

/// Renders proto-code content from kernel bytes.
pub fn render_proto_code(kernel: &[u8], kernel_path: &Path) -> Vec<u8> {
    if !kernel.starts_with(b"#!") {
        return kernel.to_vec();
    }
    let split = kernel
        .iter()
        .position(|b| *b == b'\n')
        .map_or(kernel.len(), |i| i + 1);
    let (shebang, body) = kernel.split_at(split);
    let mut out = Vec::with_capacity(kernel.len() + 128);
    out.extend_from_slice(shebang);
    if !shebang.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.extend_from_slice(generated_note(kernel_path).as_bytes());
    out.extend_from_slice(body);
    out
}

fn generated_note(kernel_path: &Path) -> String {
    let name = kernel_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from(KERNEL_EXE_NAME));
    format!(
        "# Generated from the installed `{}`; local edits are overwritten on the next bootstrap.\n",
        name
    )
}

fn digest_file(path: &Path) -> Result<Option<blake3::Hash>, RelayError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(blake3::hash(&bytes))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RelayError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_kernel_keeps_shebang() {
        let out = render_proto_code(b"#!/bin/sh\necho hi\n", Path::new("/r/venv/bin/protoprimer"));
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#!/bin/sh");
        assert!(lines[1].starts_with("# Generated from the installed `protoprimer`"));
        assert_eq!(lines[2], "echo hi");
    }

    #[test]
    fn binary_kernel_is_copied() {
        let bytes = [0x7f, b'E', b'L', b'F', 0, 1, 2];
        assert_eq!(render_proto_code(&bytes, Path::new("k")), bytes.to_vec());
    }

    #[test]
    fn update_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = dir.path().join("protoprimer");
        let proto_code = dir.path().join("proto_kernel");
        fs::write(&kernel, b"#!/bin/sh\nexit 0\n").unwrap();
        fs::write(&proto_code, b"#!/bin/sh\nold\n").unwrap();

        let sync = ProtoCodeSync::new(&kernel, &proto_code);
        assert!(!sync.is_current().unwrap());
        assert!(sync.update().unwrap());
        assert!(sync.is_current().unwrap());
        assert!(!sync.update().unwrap());

        let written = fs::read(&proto_code).unwrap();
        assert_eq!(written, sync.render().unwrap());
    }

    #[test]
    fn missing_proto_code_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = dir.path().join("protoprimer");
        fs::write(&kernel, [1u8, 2, 3]).unwrap();
        let proto_code = dir.path().join("proto_kernel");
        assert!(ProtoCodeSync::new(&kernel, &proto_code).update().unwrap());
        assert_eq!(fs::read(&proto_code).unwrap(), vec![1, 2, 3]);
    }

    #[cfg(unix)]
    #[test]
    fn permissions_follow_kernel() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let kernel = dir.path().join("protoprimer");
        fs::write(&kernel, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&kernel, fs::Permissions::from_mode(0o755)).unwrap();
        let proto_code = dir.path().join("proto_kernel");
        ProtoCodeSync::new(&kernel, &proto_code).update().unwrap();
        let mode = fs::metadata(&proto_code).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn same_file_is_never_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = dir.path().join("protoprimer");
        fs::write(&kernel, b"#!/bin/sh\n").unwrap();
        let sync = ProtoCodeSync::new(&kernel, &kernel);
        assert!(sync.is_current().unwrap());
        assert!(!sync.update().unwrap());
    }
}
