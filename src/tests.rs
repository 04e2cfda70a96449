use crate::config::{Config, Limits, Listing, Logging, Root, Server};
use crate::server::{build_router, AppState};
use crate::tree::FileTree;
use std::path::Path;
use std::sync::Arc;

fn test_config(root: &Path, limits: Limits) -> Config {
    Config {
        root: Root { root_dir: root.to_path_buf() },
        server: Server { bind_addr: "127.0.0.1".into(), port: 0, base_path: "/files".into() },
        limits,
        listing: Listing { sort_children: true },
        logging: Logging::default(),
    }
}

fn app_for(cfg: Config) -> axum::Router {
    let tree = FileTree::new(&cfg.tree_config()).unwrap();
    build_router(AppState { cfg: Arc::new(cfg), tree: Arc::new(tree) })
}

#[cfg(test)]
mod integration {
    use super::*;
    use assert_fs::prelude::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use serde_json::{json, Value};
    use std::os::unix::fs::symlink;
    use tower::ServiceExt;

    // a.txt (10 bytes), sub/ (empty)
    fn scenario_a() -> assert_fs::TempDir {
        let tmp = assert_fs::TempDir::new().unwrap();
        tmp.child("a.txt").write_str("0123456789").unwrap();
        tmp.child("sub").create_dir_all().unwrap();
        tmp
    }

    async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(uri).method("GET").body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn strip_modified(v: &mut Value) {
        match v {
            Value::Object(map) => {
                assert!(map.remove("modified").map(|m| m.is_i64()).unwrap_or(false), "missing modified in {map:?}");
                if let Some(children) = map.get_mut("children") {
                    strip_modified(children);
                }
            }
            Value::Array(items) => items.iter_mut().for_each(strip_modified),
            _ => {}
        }
    }

    #[tokio::test]
    async fn healthz_ok() {
        let tmp = scenario_a();
        let app = app_for(test_config(tmp.path(), Limits::default()));
        let (status, body) = get(&app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn root_listing_scenario_a() {
        let tmp = scenario_a();
        let app = app_for(test_config(tmp.path(), Limits::default()));
        let (status, mut body) = get(&app, "/files/tree").await;
        assert_eq!(status, StatusCode::OK);
        strip_modified(&mut body);
        assert_eq!(
            body,
            json!([
                {"name": "a.txt", "size": 10},
                {"name": "sub", "children": []}
            ])
        );
        let (_, dot) = get(&app, "/files/tree?path=.").await;
        let (_, empty) = get(&app, "/files/tree?path=").await;
        assert_eq!(dot, empty);
    }

    #[tokio::test]
    async fn symlink_escape_scenario_b() {
        let tmp = scenario_a();
        symlink("/etc/passwd", tmp.path().join("escape")).unwrap();
        let app = app_for(test_config(tmp.path(), Limits::default()));
        let (status, body) = get(&app, "/files/tree?path=escape").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"error": "Forbidden", "message": "Forbidden."}));
        let (status, body) = get(&app, "/files/tree").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body.as_array().unwrap().iter().filter_map(|n| n["name"].as_str()).collect();
        assert_eq!(names, vec!["a.txt", "sub"]);
    }

    #[tokio::test]
    async fn dotdot_scenario_c() {
        let tmp = scenario_a();
        let app = app_for(test_config(tmp.path(), Limits::default()));
        for uri in ["/files/tree?path=../../etc", "/files/tree?path=%2F..%2F..", "/files/list?path=.."] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
            assert_eq!(body["error"], "Forbidden");
        }
    }

    #[tokio::test]
    async fn file_request_scenario_d() {
        let tmp = scenario_a();
        let app = app_for(test_config(tmp.path(), Limits::default()));
        let (status, body) = get(&app, "/files/tree?path=a.txt").await;
        assert_eq!(status, StatusCode::OK);
        let nodes = body.as_array().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["name"], "a.txt");
        assert_eq!(nodes[0]["size"], 10);
        assert!(nodes[0].get("children").is_none());
    }

    #[tokio::test]
    async fn flat_list_route() {
        let tmp = scenario_a();
        tmp.child("sub/deep/x.log").write_str("x").unwrap();
        let app = app_for(test_config(tmp.path(), Limits::default()));
        let (status, body) = get(&app, "/files/list").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["/a.txt", "/sub", "/sub/deep", "/sub/deep/x.log"]));
    }

    #[tokio::test]
    async fn depth_limit_is_server_error() {
        let tmp = scenario_a();
        tmp.child("sub/1/2/3/file").write_str("x").unwrap();
        let limits = Limits { max_depth: 2, ..Limits::default() };
        let app = app_for(test_config(tmp.path(), limits));
        let (status, body) = get(&app, "/files/tree").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "DepthExceeded");
        // a shallower request stays within the limit
        let (status, _) = get(&app, "/files/tree?path=sub/1/2").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let tmp = scenario_a();
        let app = app_for(test_config(tmp.path(), Limits::default()));
        let (status, body) = get(&app, "/files/download").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFound");
    }

    #[tokio::test]
    async fn custom_base_path() {
        let tmp = scenario_a();
        let mut cfg = test_config(tmp.path(), Limits::default());
        cfg.server.base_path = "/api/browse".into();
        let app = app_for(cfg);
        let (status, _) = get(&app, "/api/browse/tree?path=sub").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = get(&app, "/files/tree").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[cfg(test)]
mod props {
    use super::*;
    use crate::tree::{CancelFlag, TreeNode};
    use proptest::prelude::*;
    use std::fs;
    use std::os::unix::fs::symlink;

    #[cfg(feature = "proptests")]
    const CASES: u32 = 512;
    #[cfg(not(feature = "proptests"))]
    const CASES: u32 = 48;

    // root/ holds a.txt, sub/b.txt and links in-link -> sub, out-link -> tmp,
    // file-link -> ../outside.txt; root-evil/ sits next to it
    fn fixture() -> (tempfile::TempDir, FileTree) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::create_dir(tmp.path().join("root-evil")).unwrap();
        fs::write(tmp.path().join("outside.txt"), b"x").unwrap();
        fs::write(root.join("a.txt"), b"abc").unwrap();
        fs::write(root.join("sub/b.txt"), b"de").unwrap();
        symlink(root.join("sub"), root.join("in-link")).unwrap();
        symlink(tmp.path(), root.join("out-link")).unwrap();
        symlink("../outside.txt", root.join("file-link")).unwrap();
        let cfg = test_config(&root, Limits::default());
        let tree = FileTree::new(&cfg.tree_config()).unwrap();
        (tmp, tree)
    }

    fn segment() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            ".", "..", "a.txt", "sub", "b.txt", "in-link", "out-link", "file-link",
            "root", "root-evil", "outside.txt", "missing", "",
        ])
    }

    fn contains_symlink_names(nodes: &[TreeNode]) -> bool {
        nodes.iter().any(|n| match n {
            TreeNode::File(f) => f.name.ends_with("-link"),
            TreeNode::Directory(d) => d.name.ends_with("-link") || contains_symlink_names(&d.children),
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(CASES))]

        #[test]
        fn success_iff_resolves_inside_root(segs in prop::collection::vec(segment(), 0..6), lead in any::<bool>()) {
            let (_tmp, tree) = fixture();
            let mut requested = segs.join("/");
            if lead {
                requested.insert(0, '/');
            }
            let expected_inside = dunce::canonicalize(tree.root().join(requested.trim_start_matches('/')))
                .map(|p| p.starts_with(tree.root()))
                .unwrap_or(false);
            let cancel = CancelFlag::new();
            match tree.list_tree(&requested, &cancel) {
                Ok(nodes) => {
                    prop_assert!(expected_inside, "accepted {requested:?}");
                    prop_assert!(!contains_symlink_names(&nodes));
                    let again = tree.list_tree(&requested, &cancel).unwrap();
                    prop_assert_eq!(nodes, again);
                }
                Err(e) => {
                    prop_assert!(!expected_inside, "rejected {requested:?}: {e}");
                    prop_assert!(matches!(e, crate::errors::AppError::Forbidden(_)));
                }
            }
        }
    }
}
