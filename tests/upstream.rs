// tests/upstream.rs

//! Upstream archive download and upstream source packages against a mock
//! HTTP server.

mod common;

use apkg::Error;
use apkg::pipeline::{self, ArchiveOptions, SrcpkgOptions};
use common::{FAKE_DISTRO, FakeStyle, load_project, setup_project};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::sync::Arc;

fn config(server_url: &str) -> String {
    format!(
        "[project]\n\
         name = \"kresd\"\n\
         \n\
         [upstream]\n\
         archive_url = \"{server_url}/dist/{{{{ project }}}}-{{{{ version }}}}.tar.gz\"\n"
    )
}

/// Gzipped tarball with a single root dir shipping a fake package template
fn upstream_tarball(root: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let files: [(&str, &[u8]); 3] = [
        ("README", b"upstream readme\n"),
        ("distro/pkg/fake/NAME", b"knot-resolver\n"),
        (
            "distro/pkg/fake/fake.template",
            b"upstream: {{ name }} {{ version }}-{{ release }}\n",
        ),
    ];
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{root}/{path}"), data)
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

#[test]
fn test_get_archive_renders_url() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/dist/kresd-1.2.3.tar.gz")
        .with_status(200)
        .with_header("content-type", "application/gzip")
        .with_body("tarball")
        .create();

    let (_temp, path) = setup_project(&config(&server.url()));
    let style = Arc::new(FakeStyle::default());
    let mut proj = load_project(&path, &style);

    let opts = ArchiveOptions {
        version: Some("1.2.3".into()),
        use_cache: false,
        ..Default::default()
    };
    let results = pipeline::get_archive(&mut proj, &opts).unwrap();

    mock.assert();
    assert_eq!(
        results,
        vec![path.join("pkg/archives/upstream/kresd-1.2.3.tar.gz")]
    );
    assert_eq!(fs::read_to_string(&results[0]).unwrap(), "tarball");
}

#[test]
fn test_get_archive_not_found() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/dist/kresd-1.2.3.tar.gz")
        .with_status(404)
        .create();

    let (_temp, path) = setup_project(&config(&server.url()));
    let style = Arc::new(FakeStyle::default());
    let mut proj = load_project(&path, &style);

    let opts = ArchiveOptions {
        version: Some("1.2.3".into()),
        use_cache: false,
        ..Default::default()
    };
    let err = pipeline::get_archive(&mut proj, &opts).unwrap_err();

    mock.assert();
    assert_eq!(err.exit_code(), 52);
    match err {
        Error::FileDownloadFailed { code, url, .. } => {
            assert_eq!(code, Some(404));
            assert!(url.ends_with("/dist/kresd-1.2.3.tar.gz"), "url: {url}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_get_archive_rejects_html() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/dist/kresd-1.2.3.tar.gz")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html>login</html>")
        .create();

    let (_temp, path) = setup_project(&config(&server.url()));
    let style = Arc::new(FakeStyle::default());
    let mut proj = load_project(&path, &style);

    let opts = ArchiveOptions {
        version: Some("1.2.3".into()),
        use_cache: false,
        ..Default::default()
    };
    let err = pipeline::get_archive(&mut proj, &opts).unwrap_err();
    match err {
        Error::FileDownloadFailed { reason, .. } => {
            assert!(reason.unwrap_or_default().contains("text/html"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_get_archive_latest_from_listing() {
    let mut server = mockito::Server::new();
    let listing = server
        .mock("GET", "/dist/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(
            "<html><body>\n\
             <a href=\"kresd-1.0.0.tar.gz\">kresd-1.0.0.tar.gz</a>\n\
             <a href=\"kresd-1.10.0.tar.gz\">kresd-1.10.0.tar.gz</a>\n\
             <a href=\"kresd-1.9.2.tar.gz\">kresd-1.9.2.tar.gz</a>\n\
             <a href=\"../\">parent</a>\n\
             </body></html>\n",
        )
        .create();
    let archive = server
        .mock("GET", "/dist/kresd-1.10.0.tar.gz")
        .with_status(200)
        .with_header("content-type", "application/x-gzip")
        .with_body("tarball")
        .create();

    let (_temp, path) = setup_project(&config(&server.url()));
    let style = Arc::new(FakeStyle::default());
    let mut proj = load_project(&path, &style);

    let opts = ArchiveOptions {
        use_cache: false,
        ..Default::default()
    };
    let results = pipeline::get_archive(&mut proj, &opts).unwrap();

    listing.assert();
    archive.assert();
    assert!(results[0].ends_with("kresd-1.10.0.tar.gz"));
}

#[test]
fn test_upstream_version_not_detected() {
    let (_temp, path) = setup_project("[project]\nname = \"kresd\"\n");
    let style = Arc::new(FakeStyle::default());
    let mut proj = load_project(&path, &style);

    let err = pipeline::get_archive(&mut proj, &ArchiveOptions::default()).unwrap_err();
    assert!(
        matches!(err, Error::UnableToDetectUpstreamVersion),
        "unexpected error: {err}"
    );
}

#[test]
fn test_upstream_srcpkg_uses_archive_template() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/dist/kresd-1.2.3.tar.gz")
        .with_status(200)
        .with_header("content-type", "application/gzip")
        .with_body(upstream_tarball("kresd-1.2.3"))
        .create();

    let (_temp, path) = setup_project(&config(&server.url()));
    let style = Arc::new(FakeStyle::default());
    let mut proj = load_project(&path, &style);

    let opts = SrcpkgOptions {
        upstream: true,
        version: Some("1.2.3".into()),
        distro: FAKE_DISTRO.to_string(),
        use_cache: false,
        ..Default::default()
    };
    let results = pipeline::make_srcpkg(&mut proj, &opts).unwrap();

    // template and name come from the unpacked archive, not the project
    assert!(results[0].ends_with("knot-resolver-1.2.3-1.fsrc"));
    assert_eq!(
        fs::read_to_string(&results[0]).unwrap(),
        "upstream: knot-resolver 1.2.3-1\n"
    );
    assert_eq!(
        proj.input_path(),
        path.join("pkg/archives/unpacked/kresd-1.2.3/distro")
    );
}

#[test]
fn test_get_archive_with_signature_and_disposition_name() {
    let mut server = mockito::Server::new();
    let archive = server
        .mock("GET", "/dist/kresd-1.2.3.tar.gz")
        .with_status(200)
        .with_header("content-type", "application/gzip")
        .with_header(
            "content-disposition",
            "attachment; filename=\"kresd-release-1.2.3.tar.gz\"",
        )
        .with_body("tarball")
        .create();
    let signature = server
        .mock("GET", "/dist/kresd-1.2.3.tar.gz.asc")
        .with_status(200)
        .with_header("content-type", "application/pgp-signature")
        .with_body("-----BEGIN PGP SIGNATURE-----\n")
        .create();

    let config = format!(
        "{}signature_url = \"{}/dist/{{{{ project }}}}-{{{{ version }}}}.tar.gz.asc\"\n",
        config(&server.url()),
        server.url()
    );
    let (_temp, path) = setup_project(&config);
    let style = Arc::new(FakeStyle::default());
    let mut proj = load_project(&path, &style);

    let opts = ArchiveOptions {
        version: Some("1.2.3".into()),
        use_cache: false,
        ..Default::default()
    };
    let results = pipeline::get_archive(&mut proj, &opts).unwrap();

    archive.assert();
    signature.assert();
    let upstream = path.join("pkg/archives/upstream");
    assert_eq!(
        results,
        vec![
            upstream.join("kresd-release-1.2.3.tar.gz"),
            upstream.join("kresd-1.2.3.tar.gz.asc"),
        ]
    );
    assert_eq!(fs::read_to_string(&results[0]).unwrap(), "tarball");
    assert!(
        fs::read_to_string(&results[1])
            .unwrap()
            .starts_with("-----BEGIN PGP SIGNATURE-----")
    );
}

#[test]
fn test_get_archive_rejects_disposition_path() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/dist/kresd-1.2.3.tar.gz")
        .with_status(200)
        .with_header("content-type", "application/gzip")
        .with_header(
            "content-disposition",
            "attachment; filename=\"../../evil.tar.gz\"",
        )
        .with_body("tarball")
        .create();

    let (temp, path) = setup_project(&config(&server.url()));
    let style = Arc::new(FakeStyle::default());
    let mut proj = load_project(&path, &style);

    let opts = ArchiveOptions {
        version: Some("1.2.3".into()),
        use_cache: false,
        ..Default::default()
    };
    let err = pipeline::get_archive(&mut proj, &opts).unwrap_err();

    assert_eq!(err.exit_code(), 52);
    match err {
        Error::FileDownloadFailed { reason, .. } => {
            assert!(reason.unwrap_or_default().contains("../../evil.tar.gz"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!path.join("pkg/evil.tar.gz").exists());
    assert!(!path.join("pkg/archives/evil.tar.gz").exists());
    assert!(!temp.path().join("evil.tar.gz").exists());
}
