// tests/plate.rs

//! Integration tests for the privileged half of a build: splitting staged
//! files into subpackages, strict file coverage, archive naming and source
//! verification.

mod common;

use alpmbuild::Error;
use alpmbuild::compression::CompressionMethod;
use alpmbuild::config::BuildOptions;
use alpmbuild::hash::{HashAlgorithm, hash_bytes};
use alpmbuild::recipe::kitchen::GpgVerifier;
use alpmbuild::recipe::kitchen::archive::write_source_package;
use alpmbuild::recipe::kitchen::files::collect_files;
use alpmbuild::recipe::kitchen::plate::{assemble_all, split_subpackage};
use alpmbuild::recipe::kitchen::sources::acquire_sources;
use common::{EmptyManifest, parse_with_header, setup_context, stage_file};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

const SPLIT_BODY: &str = "\
%package devel
Summary: Headers for foo
%package doc
Summary: Documentation for foo
%install
true
%files
/usr/bin/*
%files devel
/usr/include
/usr/lib/*.a
%files doc
/usr/share/doc/*
";

fn archive_entries(archive: &Path) -> Vec<String> {
    let decoder = flate2::read::GzDecoder::new(File::open(archive).unwrap());
    let mut tar = tar::Archive::new(decoder);
    tar.entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_split_conserves_files() {
    let (_temp, ctx) = setup_context(BuildOptions::for_recipe("foo.spec"));
    let mut recipe = parse_with_header(&ctx, SPLIT_BODY).unwrap();
    for file in [
        "usr/bin/foo",
        "usr/include/foo/foo.h",
        "usr/include/foo/bar.h",
        "usr/lib/libfoo.a",
        "usr/lib/libfoo.so",
        "usr/share/doc/foo/README",
    ] {
        stage_file(&ctx, file, "x");
    }
    let staged = collect_files(&ctx.area.package).unwrap().len();

    let mut moved = 0;
    for id in recipe.packages.subpackage_ids() {
        moved += split_subpackage(&ctx, &mut recipe, id).unwrap();
    }
    let remaining = collect_files(&ctx.area.package).unwrap().len();

    assert_eq!(moved, 4);
    assert_eq!(moved + remaining, staged);
    assert!(ctx.area.package.join("usr/lib/libfoo.so").exists());
    assert!(
        ctx.area
            .subpackage_root("foo-devel")
            .join("usr/include/foo/bar.h")
            .exists()
    );
    assert!(!ctx.area.package.join("usr/include").exists());
}

#[test]
fn test_strict_files_rejects_unlisted() {
    let mut options = BuildOptions::for_recipe("foo.spec");
    options.strict_files = true;
    let (_temp, ctx) = setup_context(options);
    let mut recipe = parse_with_header(&ctx, "%files\n/usr/bin/foo\n").unwrap();
    stage_file(&ctx, "usr/bin/foo", "x");
    stage_file(&ctx, "usr/share/stray", "x");

    let err = assemble_all(&ctx, &mut recipe, &EmptyManifest).unwrap_err();
    match err {
        Error::FileNotListed { package, path } => {
            assert_eq!(package, "foo");
            assert_eq!(path, "/usr/share/stray");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_lenient_files_accepts_unlisted() {
    let (_temp, ctx) = setup_context(BuildOptions::for_recipe("foo.spec"));
    let mut recipe = parse_with_header(&ctx, "%files\n/usr/bin/foo\n").unwrap();
    stage_file(&ctx, "usr/bin/foo", "x");
    stage_file(&ctx, "usr/share/stray", "x");

    let archives = assemble_all(&ctx, &mut recipe, &EmptyManifest).unwrap();
    assert_eq!(archives.len(), 1);
}

#[test]
fn test_no_file_check_directive() {
    let mut options = BuildOptions::for_recipe("foo.spec");
    options.strict_files = true;
    let (_temp, ctx) = setup_context(options);
    let mut recipe =
        parse_with_header(&ctx, "#!alpmbuild NoFileCheck\n%files\n/usr/bin/foo\n").unwrap();
    stage_file(&ctx, "usr/share/stray", "x");

    assert!(assemble_all(&ctx, &mut recipe, &EmptyManifest).is_ok());
}

#[test]
fn test_archive_names_and_contents() {
    let mut options = BuildOptions::for_recipe("foo.spec");
    options.compression = CompressionMethod::Gz;
    let (_temp, ctx) = setup_context(options);
    let mut recipe = parse_with_header(&ctx, &format!("Epoch: 1\n{}", SPLIT_BODY)).unwrap();
    stage_file(&ctx, "usr/bin/foo", "#!/bin/sh\n");
    stage_file(&ctx, "usr/include/foo.h", "int foo(void);\n");

    let archives = assemble_all(&ctx, &mut recipe, &EmptyManifest).unwrap();
    let names: Vec<String> = archives
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    let arch = &ctx.arch;
    assert_eq!(
        names,
        vec![
            format!("foo-devel-1:1.0-1-{}.pkg.tar.gz", arch),
            format!("foo-doc-1:1.0-1-{}.pkg.tar.gz", arch),
            format!("foo-1:1.0-1-{}.pkg.tar.gz", arch),
        ]
    );

    let entries = archive_entries(&archives[0]);
    assert_eq!(entries[0], ".PKGINFO");
    assert!(entries.contains(&"usr/include/foo.h".to_string()));
    assert!(!entries.iter().any(|e| e.starts_with("usr/bin")));

    let pkginfo = fs::read_to_string(ctx.area.subpackage_root("foo-devel").join(".PKGINFO"))
        .unwrap();
    assert!(pkginfo.contains("pkgname = foo-devel\n"));
    assert!(pkginfo.contains("pkgbase = foo\n"));
    assert!(pkginfo.contains("pkgver = 1:1.0-1\n"));
}

#[test]
fn test_checksum_mismatch_is_fatal() {
    let (_temp, ctx) = setup_context(BuildOptions::for_recipe("foo.spec"));
    fs::write(ctx.area.sources.join("foo-1.0.tar.gz"), b"tampered").unwrap();
    let expected = hash_bytes(HashAlgorithm::Sha256, b"original");
    let recipe = parse_with_header(
        &ctx,
        &format!("Source0: %{{name}}-%{{version}}.tar.gz with sha256 {}\n", expected),
    )
    .unwrap();

    let err = acquire_sources(&ctx, &recipe, &GpgVerifier).unwrap_err();
    match err {
        Error::ChecksumMismatch {
            file,
            algorithm,
            expected: want,
            actual,
        } => {
            assert_eq!(file, "foo-1.0.tar.gz");
            assert_eq!(algorithm, "sha256");
            assert_eq!(want, expected);
            assert_eq!(actual, hash_bytes(HashAlgorithm::Sha256, b"tampered"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_local_sources_are_copied_and_packaged() {
    let (_temp, ctx) = setup_context(BuildOptions::for_recipe("foo.spec"));
    fs::write(ctx.area.sources.join("foo-1.0.tar.gz"), b"tarball").unwrap();
    fs::write(ctx.area.sources.join("fix-build.patch"), b"--- a\n+++ b\n").unwrap();
    let digest = hash_bytes(HashAlgorithm::Md5, b"tarball");
    let recipe = parse_with_header(
        &ctx,
        &format!(
            "Source0: foo-1.0.tar.gz with md5 {}\nSource1: https://example.org/extra.tar.gz\nPatch0: fix-build.patch\n",
            digest
        ),
    )
    .unwrap();

    let mut only_local = recipe.clone();
    only_local.packages.root_mut().sources.truncate(1);
    let acquired = acquire_sources(&ctx, &only_local, &GpgVerifier).unwrap();
    assert_eq!(acquired.len(), 2);
    assert!(ctx.area.build.join("fix-build.patch").exists());

    let mut contents = String::new();
    File::open(&acquired[0])
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, "tarball");

    let src_package = write_source_package(&ctx, &recipe).unwrap();
    let name = src_package.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(name, format!("foo-1.0-1-{}.alpmsrc.pkg.tar.zst", ctx.arch));
    assert!(src_package.exists());
}
