use std::io::Read;
use std::sync::Arc;

use vfs_loader::{Error, Handle, HandlerContext, VPathBuf, VirtualFs};

struct PlainText(String);

struct Meshy {
    name: String,
}

fn text_handler(ctx: &mut HandlerContext<'_>) -> Result<bool, Error> {
    let mut buf = String::new();
    ctx.stream().read_to_string(&mut buf)?;
    ctx.mount_point_handle().mount(Handle::new(PlainText(buf)))?;
    Ok(true)
}

#[test]
fn a_resource_loads_from_a_mounted_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("greeting.txt"), b"hi there").unwrap();

    let mut vfs = VirtualFs::new();
    vfs.register_extension::<PlainText>(".txt", text_handler);
    vfs.mount(&VPathBuf::new("/assets/").unwrap(), dir.path()).unwrap();

    let loaded: Arc<PlainText> = vfs
        .load(&VPathBuf::new("/assets/greeting").unwrap())
        .unwrap();
    assert_eq!(loaded.0, "hi there");
}

#[test]
fn loading_a_path_with_no_mount_fails_with_not_found() {
    let mut vfs = VirtualFs::new();
    vfs.register_extension::<PlainText>(".txt", text_handler);
    let err = vfs
        .try_load::<PlainText>(&VPathBuf::new("/assets/missing").unwrap())
        .unwrap();
    assert!(err.is_none());
}

#[test]
fn unregistered_extension_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.obj");
    std::fs::write(&model_path, b"v 0 0 0").unwrap();

    // An explicit single-file mount dispatches on the real file's own
    // extension, independent of any type's canonical extension — nothing
    // has registered a handler chain for ".obj", so this fails outright.
    let mut vfs = VirtualFs::new();
    let err = vfs
        .mount(&VPathBuf::new("/assets/").unwrap(), &model_path)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownExtension(ext) if ext == ".obj"));
}

#[test]
fn mounting_a_second_directory_at_the_same_point_shadows_the_first() {
    let base = tempfile::tempdir().unwrap();
    std::fs::write(base.path().join("config.txt"), b"base settings").unwrap();
    let overlay = tempfile::tempdir().unwrap();
    std::fs::write(overlay.path().join("config.txt"), b"overlay settings").unwrap();

    let mut vfs = VirtualFs::new();
    vfs.register_extension::<PlainText>(".txt", text_handler);
    let mp = VPathBuf::new("/config/").unwrap();
    vfs.mount(&mp, base.path()).unwrap();
    vfs.mount(&mp, overlay.path()).unwrap();

    let loaded: Arc<PlainText> = vfs.load(&VPathBuf::new("/config/config").unwrap()).unwrap();
    assert_eq!(loaded.0, "overlay settings");
}

#[test]
fn a_chained_extension_handler_can_delegate_to_the_one_registered_before_it() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bob.md5mesh"), b"MD5Version 10\ncommandline \"\"\n").unwrap();

    let mut vfs = VirtualFs::new();
    vfs.register_extension::<Meshy>(".md5mesh", |ctx: &mut HandlerContext<'_>| {
        let mut buf = String::new();
        ctx.stream().read_to_string(&mut buf)?;
        if !buf.starts_with("MD5Version") {
            return Ok(false);
        }
        ctx.mount_point_handle().mount(Handle::new(Meshy {
            name: ctx.mount_point().as_str().to_owned(),
        }))?;
        Ok(true)
    });
    // A second, newer registration wraps the first and always delegates,
    // simulating a decorator that e.g. would log a cache-miss in a real build.
    vfs.register_extension::<Meshy>(".md5mesh", |ctx: &mut HandlerContext<'_>| ctx.call_next());

    vfs.mount(&VPathBuf::new("/assets/").unwrap(), dir.path()).unwrap();

    let loaded: Arc<Meshy> = vfs.load(&VPathBuf::new("/assets/bob").unwrap()).unwrap();
    // The handler sees the path relative to the directory mount it ran
    // under, not the full virtual path the caller requested.
    assert_eq!(loaded.name, "/bob");
}

#[test]
fn a_real_directory_mount_caches_materialised_resources_by_identity() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bob.txt"), b"hello").unwrap();

    let mut vfs = VirtualFs::new();
    vfs.register_extension::<PlainText>(".txt", text_handler);
    vfs.mount(&VPathBuf::new("/assets/").unwrap(), dir.path()).unwrap();

    let path = VPathBuf::new("/assets/bob").unwrap();
    let first: Arc<PlainText> = vfs.load(&path).unwrap();
    let second: Arc<PlainText> = vfs.load(&path).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn explicit_file_mount_is_available_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let settings_path = dir.path().join("settings.txt");
    std::fs::write(&settings_path, b"fullscreen=true").unwrap();

    let mut vfs = VirtualFs::new();
    vfs.register_extension::<PlainText>(".txt", text_handler);
    vfs.mount(&VPathBuf::new("/config/settings.txt").unwrap(), &settings_path)
        .unwrap();

    let loaded: Arc<PlainText> = vfs
        .load(&VPathBuf::new("/config/settings.txt").unwrap())
        .unwrap();
    assert_eq!(loaded.0, "fullscreen=true");
}

#[cfg(unix)]
#[test]
fn a_symlink_cannot_be_used_to_read_outside_the_mounted_directory() {
    let secret_dir = tempfile::tempdir().unwrap();
    std::fs::write(secret_dir.path().join("secret.txt"), b"do not read me").unwrap();

    let mounted = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink(
        secret_dir.path().join("secret.txt"),
        mounted.path().join("escape.txt"),
    )
    .unwrap();

    let mut vfs = VirtualFs::new();
    vfs.register_extension::<PlainText>(".txt", text_handler);
    vfs.mount(&VPathBuf::new("/assets/").unwrap(), mounted.path()).unwrap();

    let err = vfs
        .load::<PlainText>(&VPathBuf::new("/assets/escape").unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::PathEscape(_)));
}
