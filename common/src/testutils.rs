use anyhow::Context;
use std::path::Path;

pub fn setup_test_tree() -> anyhow::Result<tempfile::TempDir> {
    let tmp_dir = tempfile::tempdir()?;
    // foo
    // |- 0.txt
    // |- bar
    //    |- 1.txt
    //    |- 2.txt
    //    |- 3.txt
    // |- baz
    //    |- 4.txt
    //    |- qux
    //       |- 5.tmp
    let foo_path = tmp_dir.path().join("foo");
    std::fs::create_dir(&foo_path)?;
    std::fs::write(foo_path.join("0.txt"), "0")?;
    let bar_path = foo_path.join("bar");
    std::fs::create_dir(&bar_path)?;
    std::fs::write(bar_path.join("1.txt"), "1")?;
    std::fs::write(bar_path.join("2.txt"), "22")?;
    std::fs::write(bar_path.join("3.txt"), "333")?;
    let baz_path = foo_path.join("baz");
    std::fs::create_dir(&baz_path)?;
    std::fs::write(baz_path.join("4.txt"), "4444")?;
    let qux_path = baz_path.join("qux");
    std::fs::create_dir(&qux_path)?;
    std::fs::write(qux_path.join("5.tmp"), "55555")?;
    Ok(tmp_dir)
}

/// Sum of the sizes of every file in the tree created by [`setup_test_tree`]
pub const TEST_TREE_BYTES: u64 = 1 + 1 + 2 + 3 + 4 + 5;

/// Assert `dst` holds byte-identical copies of every entry below `src`
pub fn check_dirs_identical(src: &Path, dst: &Path) -> anyhow::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let src_entry_path = entry?.path();
        let src_entry_name = src_entry_path.file_name().context("entry without a name")?;
        let dst_entry_path = dst.join(src_entry_name);
        let src_md = std::fs::metadata(&src_entry_path)
            .with_context(|| format!("source file {:?} is missing", &src_entry_path))?;
        let dst_md = std::fs::metadata(&dst_entry_path)
            .with_context(|| format!("destination file {:?} is missing", &dst_entry_path))?;
        assert_eq!(src_md.is_file(), dst_md.is_file(), "{:?}", &dst_entry_path);
        if src_md.is_file() {
            assert_eq!(
                std::fs::read(&src_entry_path)?,
                std::fs::read(&dst_entry_path)?,
                "{:?} differs",
                &dst_entry_path
            );
        } else {
            check_dirs_identical(&src_entry_path, &dst_entry_path)?;
        }
    }
    Ok(())
}
