pub(super) const ROOT_LONG_ABOUT: &str = "\
Snapshot a file tree and verify it later against bit-rot and metadata drift

Filekeep records the size, modification time, permission bits and SHA-1 checksum
of every file and directory in a tree into a single manifest. Later runs compare
the live tree against that manifest and report every difference. Differences in
modification time and permissions alone can be repaired; content is never changed.

CORE CONCEPTS:

  Collection:
    A tracked directory tree plus its manifest. Every collection has a display
    name, set with 'create --name'.

  Manifest location:
    For the current directory the manifest is ./filekeep.toml, inside the tree
    and skipped when walking it. With '-d NAME' the tree is ./NAME and the
    manifest is the sibling file ./NAME.filekeep.toml.

TYPICAL WORKFLOW:

  1. Snapshot an archive:
     $ cd /archive/photos
     $ filekeep create --name \"Photos 2024\"

  2. Copy, back up or move the tree around

  3. Check that nothing rotted or changed:
     $ filekeep verify

  4. Restore modification times lost by a copy tool:
     $ filekeep touch

COMMANDS:

  create      Snapshot the tree into a new manifest. Refuses to overwrite.
  verify      Compare the tree with its manifest. Exit code 1 on any difference.
  touch       Verify and restore recorded metadata where only metadata differs.
  duplicates  List files with identical content.
  export      Print a listing readable by 'sha1sum -c'.
  info        Show the collection name, counts and total size.

GLOBAL OPTIONS:

  -d, --directory <NAME>
    Operate on the immediate subdirectory NAME of the current directory.

  -v, --verbose / --log-level <LEVEL>
    Control log output on stderr. RUST_LOG is honored when neither is given.

EXIT CODES:

  0    Success
  1    Verification found differences, or invalid arguments
  255  Any other error (I/O, malformed manifest, missing or existing collection)";

pub(super) const CREATE_LONG_ABOUT: &str = "\
Snapshot the tree into a new collection manifest

Walks the whole tree, checksums every regular file and writes the manifest.
Symbolic links and special files are skipped. Fails if a manifest already exists
for the selected tree, so an existing record is never overwritten by accident.

A progress indicator is shown on stderr when it is a terminal; --quiet hides it.

EXAMPLES:

  $ filekeep create
  $ filekeep create --name \"Family photos\"
  $ filekeep -d photos create --quiet";

pub(super) const VERIFY_LONG_ABOUT: &str = "\
Verify the tree against its manifest, exit with success if nothing differs

Reports extra and missing files and directories, and for every file compares
modification time, permission bits, size and SHA-1 checksum. Directories have
their own modification time and permission bits compared as well.

With --touch, an entry whose only differences are modification time or
permissions gets the recorded values written back once the walk is done. A file
is only repaired after its checksum was confirmed, and a directory only when
nothing else inside it differs. Every difference is reported either way.

OPTIONS:

  --fast
    Skip checksumming files whose size matches and that need no repair.
    Catches changes that touched metadata, not silent corruption.

  --flexible-mtime
    Compare modification times to the whole second, for trees copied through
    filesystems or tools that drop sub-second precision.

  --ignore-mtime
    Do not compare modification times at all.

EXIT CODES:

  0    No unrepaired differences
  1    Differences found
  255  Error while reading the tree or the manifest";

pub(super) const EXPORT_LONG_ABOUT: &str = "\
Print a checksum listing of the collection

The sha1sum format prints one '<sha1> *<path>' line per file, with paths relative
to the tree and '/'-separated. The output can be checked with the standard tool:

  $ filekeep export > SHA1SUMS
  $ sha1sum -c SHA1SUMS";
