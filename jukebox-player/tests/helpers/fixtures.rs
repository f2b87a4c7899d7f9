//! Files, writers and child processes shared by the integration tests

use jukebox_player::supervisor::ChildCommand;
use std::cell::RefCell;
use std::io::{self, Seek, SeekFrom, Write};
use std::rc::Rc;
use tempfile::NamedTempFile;

/// Cloneable in-memory writer; clones share the buffer
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Temporary sysfs-style value file
pub fn input_file(level: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create input file");
    set_input(&mut file, level);
    file
}

/// Replace the content of an input file
pub fn set_input(file: &mut NamedTempFile, level: &str) {
    let inner = file.as_file_mut();
    inner.set_len(0).expect("Failed to truncate input file");
    inner.seek(SeekFrom::Start(0)).expect("Failed to rewind input file");
    writeln!(inner, "{}", level).expect("Failed to write input file");
    inner.flush().expect("Failed to flush input file");
}

/// Child running a shell script in place of the player
pub fn sh_child(script: &str) -> ChildCommand {
    ChildCommand::new("/bin/sh", ["-c", script])
}
