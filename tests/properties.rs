//! Property tests for the command tree, references and the credential store.

use proptest::prelude::*;
use tempfile::TempDir;

use zedcli::auth::{CredentialStore, Credentials, Tokens};
use zedcli::charm;
use zedcli::cli;
use zedcli::core::Commitish;

// =============================================================================
// Command tree
// =============================================================================

#[test]
fn command_tree_has_no_cycles() {
    assert!(!cli::build().has_cycle());
}

#[tokio::test]
async fn every_command_renders_help() {
    let root = cli::build();
    let mut paths: Vec<Vec<String>> = Vec::new();
    root.walk(|path| {
        paths.push(path[1..].iter().map(|spec| spec.name.clone()).collect());
    });
    assert!(paths.len() > 10, "walked {} commands", paths.len());

    for path in paths {
        let mut args = path.clone();
        args.push("-h".to_string());
        let mut out = Vec::new();
        charm::exec_to(&root, args, &mut out)
            .await
            .unwrap_or_else(|err| panic!("zed {}: {err:#}", path.join(" ")));
        let help = String::from_utf8(out).unwrap();
        let name = std::iter::once("zed".to_string())
            .chain(path.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        assert!(help.contains("NAME"), "no help for {name}");
        assert!(help.contains(&name), "help for {name}:\n{help}");
    }
}

// =============================================================================
// Commitish
// =============================================================================

fn name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.-]{1,16}"
}

proptest! {
    #[test]
    fn commitish_display_parses_back(pool in name(), branch in name()) {
        let head = Commitish::new(pool.clone(), branch.clone());
        let parsed = Commitish::parse(&head.to_string()).unwrap();
        prop_assert_eq!(parsed.pool(), pool.as_str());
        prop_assert_eq!(parsed.branch(), branch.as_str());
    }

    #[test]
    fn bare_pool_defaults_to_main(pool in name()) {
        let parsed = Commitish::parse(&pool).unwrap();
        prop_assert_eq!(parsed.branch(), "main");
    }
}

// =============================================================================
// Credential store
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Add(usize, String),
    Remove(usize),
}

const ENDPOINTS: [&str; 4] = [
    "http://localhost:9867",
    "https://lake.example.com",
    "https://lake.example.com/v2",
    "memory:",
];

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ENDPOINTS.len(), "[A-Za-z0-9]{1,12}").prop_map(|(i, t)| Op::Add(i, t)),
        (0..ENDPOINTS.len()).prop_map(Op::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn store_matches_ordered_model(ops in prop::collection::vec(op(), 1..20)) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(Some(dir.path())).unwrap();
        let mut model: Vec<(&str, String)> = Vec::new();

        for op in ops {
            let mut creds: Credentials = store.load().unwrap();
            match op {
                Op::Add(i, token) => {
                    creds.add(ENDPOINTS[i], Tokens::new(token.clone()));
                    model.retain(|(endpoint, _)| *endpoint != ENDPOINTS[i]);
                    model.push((ENDPOINTS[i], token));
                }
                Op::Remove(i) => {
                    let before = model.len();
                    model.retain(|(endpoint, _)| *endpoint != ENDPOINTS[i]);
                    prop_assert_eq!(creds.remove(ENDPOINTS[i]), model.len() != before);
                }
            }
            store.save(&creds).unwrap();

            let loaded = store.load().unwrap();
            for endpoint in ENDPOINTS {
                let want = model.iter().find(|(e, _)| *e == endpoint).map(|(_, t)| t.clone());
                prop_assert_eq!(loaded.lookup(endpoint).map(|t| t.access.clone()), want);
            }
            let stored: Vec<&str> = loaded.endpoints().collect();
            let order: Vec<&str> = model.iter().map(|(endpoint, _)| *endpoint).collect();
            prop_assert_eq!(stored, order);
        }
    }
}
