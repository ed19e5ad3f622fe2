//! File metadata shared by remote backends and commands.

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;
const S_IFREG: u32 = 0o100000;
const S_IFIFO: u32 = 0o010000;
const S_IFSOCK: u32 = 0o140000;
const S_IFCHR: u32 = 0o020000;
const S_IFBLK: u32 = 0o060000;

/// Coarse file type decoded from `st_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
    Symlink,
    Fifo,
    Socket,
    CharDevice,
    BlockDevice,
}

/// Attributes of one remote file, as returned by stat/lstat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileStat {
    /// Raw `st_mode` including the type bits.
    pub mode: u32,
    pub size: u64,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: i64,
    pub uid: u32,
    pub gid: u32,
}

impl FileStat {
    pub fn kind(&self) -> FileKind {
        match self.mode & S_IFMT {
            S_IFDIR => FileKind::Dir,
            S_IFLNK => FileKind::Symlink,
            S_IFIFO => FileKind::Fifo,
            S_IFSOCK => FileKind::Socket,
            S_IFCHR => FileKind::CharDevice,
            S_IFBLK => FileKind::BlockDevice,
            _ => FileKind::File,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == FileKind::Dir
    }

    pub fn is_symlink(&self) -> bool {
        self.kind() == FileKind::Symlink
    }

    pub fn is_file(&self) -> bool {
        self.kind() == FileKind::File
    }

    /// Permission bits only.
    pub fn perm(&self) -> u32 {
        self.mode & 0o7777
    }

    /// `ls -l` style mode column, e.g. `drwxr-xr-x`.
    pub fn mode_string(&self) -> String {
        let type_char = match self.kind() {
            FileKind::File => '-',
            FileKind::Dir => 'd',
            FileKind::Symlink => 'l',
            FileKind::Fifo => 'p',
            FileKind::Socket => 's',
            FileKind::CharDevice => 'c',
            FileKind::BlockDevice => 'b',
        };
        let mut out = String::with_capacity(10);
        out.push(type_char);
        let perm = self.mode;
        let triplets = [
            (0o400, 0o200, 0o100, 0o4000, 's'),
            (0o040, 0o020, 0o010, 0o2000, 's'),
            (0o004, 0o002, 0o001, 0o1000, 't'),
        ];
        for (r, w, x, special, special_char) in triplets {
            out.push(if perm & r != 0 { 'r' } else { '-' });
            out.push(if perm & w != 0 { 'w' } else { '-' });
            let exec = perm & x != 0;
            out.push(match (perm & special != 0, exec) {
                (true, true) => special_char,
                (true, false) => special_char.to_ascii_uppercase(),
                (false, true) => 'x',
                (false, false) => '-',
            });
        }
        out
    }

    /// Synthetic stat used for directory placeholders in tests and listings.
    pub fn directory(perm: u32) -> Self {
        Self {
            mode: S_IFDIR | (perm & 0o7777),
            ..Self::default()
        }
    }

    pub fn regular(perm: u32, size: u64) -> Self {
        Self {
            mode: S_IFREG | (perm & 0o7777),
            size,
            ..Self::default()
        }
    }

    pub fn symlink() -> Self {
        Self {
            mode: S_IFLNK | 0o777,
            ..Self::default()
        }
    }
}

/// One directory entry: base name plus lstat attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub stat: FileStat,
}
