//! `ext2util`: a thin command-line wrapper around the `ext2fs` engine.

use ext2fs::Error;
use ext2fs::Filesystem;
use std::env;
use std::fs;
use std::path::Path;
use std::process::exit;

/// Prints the command's usage.
fn print_usage(bin: &str) {
    eprintln!("Usage:");
    eprintln!(" {bin} <image> mount");
    eprintln!(" {bin} <image> ls <dir-ino>");
    eprintln!(" {bin} <image> dump-inode <ino>");
    eprintln!(" {bin} <image> dump-superblock");
    eprintln!(" {bin} <image> dump-group <group-no>");
    eprintln!(" {bin} <image> cat <ino>");
    eprintln!(" {bin} <image> cat-path </a/b>");
    eprintln!(" {bin} <image> write <parent-ino> <name> <host-path> [mode-octal]");
    eprintln!(" {bin} <image> overwrite <ino> <host-path>");
    eprintln!(" {bin} <image> mkdir <parent-ino> <name> [mode-octal]");
    eprintln!(" {bin} <image> rm <parent-ino> <name>");
}

/// Maps an engine error to a process exit code, per the operation table's recommendation.
fn exit_code(err: &Error) -> i32 {
    match err {
        Error::Io(_) => 2,
        Error::BadSuperblock => 3,
        Error::CorruptMetadata(_) => 4,
        Error::NoSpace => 5,
        Error::NotFound => 6,
        Error::NameExists => 7,
        Error::DuplicateInode => 8,
        Error::DoubleFree => 9,
    }
}

fn die(bin: &str, err: Error) -> ! {
    eprintln!("{bin}: error: {err}");
    exit(exit_code(&err));
}

fn parse_ino(bin: &str, s: &str) -> u32 {
    s.parse().unwrap_or_else(|_| {
        eprintln!("{bin}: error: invalid inode number `{s}`");
        exit(1);
    })
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let bin = args.first().map(String::as_str).unwrap_or("ext2util");
    let a: Vec<&str> = args.iter().map(String::as_str).collect();

    let [_, image, rest @ ..] = a[..] else {
        print_usage(bin);
        exit(1);
    };

    let mut fs = Filesystem::mount_file(Path::new(image)).unwrap_or_else(|e| die(bin, e));

    match rest {
        ["mount"] => {
            let sb = fs.superblock();
            println!("block size:  {}", sb.block_size());
            println!("inodes:      {}", sb.total_inodes);
            println!("blocks:      {}", sb.total_blocks);
            println!("free blocks: {}", sb.free_blocks);
            println!("free inodes: {}", sb.free_inodes);
        }

        ["ls", dir_ino] => {
            let ino = parse_ino(bin, dir_ino);
            let entries = fs.ls(ino).unwrap_or_else(|e| die(bin, e));
            for entry in entries {
                let kind = if entry.is_dir { 'd' } else { '-' };
                println!("{:<8} {kind} {:o} {:>10} {}", entry.ino, entry.mode & 0o7777, entry.size, entry.name);
            }
        }

        ["dump-inode", ino] => {
            let ino = parse_ino(bin, ino);
            let inode = fs.read_inode(ino).unwrap_or_else(|e| die(bin, e));
            println!("mode:        {:o}", inode.mode);
            println!("size:        {}", inode.size);
            println!("links_count: {}", inode.links_count);
            println!("blocks:      {}", inode.blocks);
            println!("direct:      {:?}", &inode.block[..12]);
            println!("indirect:    {}", inode.block[12]);
        }

        ["dump-superblock"] => {
            let sb = fs.superblock();
            println!("magic:            {:#06x}", sb.magic);
            println!("block size:       {}", sb.block_size());
            println!("inodes per group: {}", sb.inodes_per_group);
            println!("blocks per group: {}", sb.blocks_per_group);
            println!("total inodes:     {}", sb.total_inodes);
            println!("total blocks:     {}", sb.total_blocks);
        }

        ["dump-group", group_no] => {
            let group_no: u32 = parse_ino(bin, group_no);
            let gd = fs.groups().get(group_no);
            println!("block_bitmap:      {}", gd.block_bitmap);
            println!("inode_bitmap:      {}", gd.inode_bitmap);
            println!("inode_table:       {}", gd.inode_table);
            println!("free_blocks_count: {}", gd.free_blocks_count);
            println!("free_inodes_count: {}", gd.free_inodes_count);
            println!("used_dirs_count:   {}", gd.used_dirs_count);
        }

        ["cat", ino] => {
            let ino = parse_ino(bin, ino);
            let data = fs.read_file(ino).unwrap_or_else(|e| die(bin, e));
            use std::io::Write;
            std::io::stdout().write_all(&data).unwrap_or_else(|e| die(bin, e.into()));
        }

        ["cat-path", path] => {
            let data = fs.read_path(path).unwrap_or_else(|e| die(bin, e));
            use std::io::Write;
            std::io::stdout().write_all(&data).unwrap_or_else(|e| die(bin, e.into()));
        }

        ["write", parent_ino, name, host_path] => {
            let parent_ino = parse_ino(bin, parent_ino);
            let data = fs::read(host_path).unwrap_or_else(|e| die(bin, e.into()));
            let ino = fs.write_file(parent_ino, name, &data, 0o644).unwrap_or_else(|e| die(bin, e));
            println!("{ino}");
        }

        ["write", parent_ino, name, host_path, mode] => {
            let parent_ino = parse_ino(bin, parent_ino);
            let mode = u16::from_str_radix(mode, 8).unwrap_or_else(|_| {
                eprintln!("{bin}: error: invalid mode `{mode}`");
                exit(1);
            });
            let data = fs::read(host_path).unwrap_or_else(|e| die(bin, e.into()));
            let ino = fs.write_file(parent_ino, name, &data, mode).unwrap_or_else(|e| die(bin, e));
            println!("{ino}");
        }

        ["overwrite", ino, host_path] => {
            let ino = parse_ino(bin, ino);
            let data = fs::read(host_path).unwrap_or_else(|e| die(bin, e.into()));
            fs.overwrite_file(ino, &data).unwrap_or_else(|e| die(bin, e));
        }

        ["mkdir", parent_ino, name] => {
            let parent_ino = parse_ino(bin, parent_ino);
            let ino = fs.mkdir(parent_ino, name, 0o755).unwrap_or_else(|e| die(bin, e));
            println!("{ino}");
        }

        ["mkdir", parent_ino, name, mode] => {
            let parent_ino = parse_ino(bin, parent_ino);
            let mode = u16::from_str_radix(mode, 8).unwrap_or_else(|_| {
                eprintln!("{bin}: error: invalid mode `{mode}`");
                exit(1);
            });
            let ino = fs.mkdir(parent_ino, name, mode).unwrap_or_else(|e| die(bin, e));
            println!("{ino}");
        }

        ["rm", parent_ino, name] => {
            let parent_ino = parse_ino(bin, parent_ino);
            fs.unlink(parent_ino, name).unwrap_or_else(|e| die(bin, e));
        }

        _ => {
            print_usage(bin);
            exit(1);
        }
    }
}
