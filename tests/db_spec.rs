use std::collections::BTreeMap;

use product_versions::cloning::ClonePolicy;
use product_versions::db::Database;
use product_versions::models::*;
use product_versions::{Error, StorageError};
use speculate2::speculate;
use uuid::Uuid;

fn create_product(db: &Database, name: &str) -> Product {
    db.create_product(CreateProductInput {
        name: name.to_string(),
        description: None,
    })
    .expect("Failed to create product")
}

fn create_version(db: &Database, product: &Product, version: &str) -> ProductVersion {
    db.create_version(
        product.id,
        CreateVersionInput {
            version: version.to_string(),
            ..Default::default()
        },
    )
    .expect("Failed to create version")
}

fn create_user(db: &Database, username: &str) -> User {
    db.create_user(CreateUserInput {
        username: username.to_string(),
    })
    .expect("Failed to create user")
}

fn version_strings(db: &Database, product: &Product) -> Vec<String> {
    db.get_versions_by_product(product.id)
        .expect("Query failed")
        .into_iter()
        .map(|v| v.version)
        .collect()
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "products" {
        it "creates a product" {
            let product = create_product(&db, "Some Product");

            assert_eq!(product.name, "Some Product");
            assert!(product.description.is_none());
            assert_eq!(db.get_product(product.id).unwrap().unwrap(), product);
        }

        it "returns None for a non-existent product" {
            assert!(db.get_product(Uuid::new_v4()).expect("Query failed").is_none());
        }

        it "lists products ordered by name" {
            create_product(&db, "Zebra");
            create_product(&db, "Alpha");

            let names: Vec<String> = db
                .get_all_products()
                .unwrap()
                .into_iter()
                .map(|p| p.name)
                .collect();
            assert_eq!(names, vec!["Alpha", "Zebra"]);
        }

        it "rejects a blank name" {
            let result = db.create_product(CreateProductInput {
                name: "   ".to_string(),
                description: None,
            });
            assert!(matches!(result, Err(Error::Validation(_))));
        }

        it "shows a product with its versions in order" {
            let product = create_product(&db, "Firefox");
            create_version(&db, &product, "4.0");
            create_version(&db, &product, "3.6");

            let detail = db.get_product_with_versions(product.id).unwrap().unwrap();
            let versions: Vec<&str> = detail.versions.iter().map(|v| v.version.as_str()).collect();
            assert_eq!(versions, vec!["3.6", "4.0"]);
        }
    }

    describe "product_versions" {
        it "displays as product name and version" {
            let product = create_product(&db, "Some Product");
            let pv = create_version(&db, &product, "1.0");

            let detail = db.get_version_detail(pv.id).unwrap().unwrap();
            assert_eq!(detail.to_string(), "Some Product 1.0");
        }

        it "has its product as parent" {
            let product = create_product(&db, "Some Product");
            let pv = create_version(&db, &product, "1.0");

            assert_eq!(pv.parent(), product.id);
        }

        it "rejects a blank version" {
            let product = create_product(&db, "Some Product");
            let result = db.create_version(product.id, CreateVersionInput {
                version: "".to_string(),
                ..Default::default()
            });
            assert!(matches!(result, Err(Error::Validation(_))));
        }

        it "fails for a missing product" {
            let missing = Uuid::new_v4();
            let result = db.create_version(missing, CreateVersionInput {
                version: "1.0".to_string(),
                ..Default::default()
            });
            assert!(matches!(result, Err(Error::NotFound { id, .. }) if id == missing));
        }

        it "rejects a duplicate version within a product" {
            let product = create_product(&db, "Some Product");
            create_version(&db, &product, "1.0");

            let result = db.create_version(product.id, CreateVersionInput {
                version: "1.0".to_string(),
                ..Default::default()
            });
            assert!(matches!(result, Err(Error::Storage(StorageError::Constraint(_)))));
            assert_eq!(version_strings(&db, &product), vec!["1.0"]);
        }

        it "allows the same version in another product" {
            let first = create_product(&db, "First");
            let second = create_product(&db, "Second");
            create_version(&db, &first, "1.0");

            let pv = create_version(&db, &second, "1.0");
            assert_eq!(pv.order, 1);
        }

        it "returns None when updating a non-existent version" {
            let result = db.update_version(Uuid::new_v4(), UpdateVersionInput {
                codename: Some("Ghost".to_string()),
                ..Default::default()
            }).unwrap();
            assert!(result.is_none());
        }
    }

    describe "teams" {
        it "uses its own team when has_team is set" {
            let product = create_product(&db, "Some Product");
            let pv = db.create_version(product.id, CreateVersionInput {
                version: "1.0".to_string(),
                has_team: true,
                ..Default::default()
            }).unwrap();
            let u = create_user(&db, "alice");
            db.add_version_team_member(pv.id, u.id).unwrap();

            assert_eq!(db.get_version_team(pv.id).unwrap(), vec![u]);
        }

        it "inherits the product team when has_team is not set" {
            let product = create_product(&db, "Some Product");
            let pv = create_version(&db, &product, "1.0");
            let u = create_user(&db, "bob");
            db.add_product_team_member(product.id, u.id).unwrap();

            assert_eq!(db.get_version_team(pv.id).unwrap(), vec![u]);
        }

        it "ignores repeated membership" {
            let product = create_product(&db, "Some Product");
            let u = create_user(&db, "carol");
            db.add_product_team_member(product.id, u.id).unwrap();
            db.add_product_team_member(product.id, u.id).unwrap();

            assert_eq!(db.get_product_team(product.id).unwrap().len(), 1);
        }

        it "fails for an unknown user" {
            let product = create_product(&db, "Some Product");
            let result = db.add_product_team_member(product.id, Uuid::new_v4());
            assert!(matches!(result, Err(Error::NotFound { entity: "user", .. })));
        }
    }

    describe "environments" {
        it "attaches one environment per combination" {
            let product = create_product(&db, "Some Product");
            let pv = create_version(&db, &product, "1.0");
            let mut categories = BTreeMap::new();
            categories.insert("Browser".to_string(), vec!["Firefox".to_string(), "Chrome".to_string()]);
            categories.insert("OS".to_string(), vec!["Linux".to_string()]);

            let created = db.attach_environment_matrix(pv.id, &categories).unwrap();

            assert_eq!(created.len(), 2);
            let elements: Vec<Vec<String>> = db
                .get_version_environments(pv.id)
                .unwrap()
                .into_iter()
                .map(|e| e.elements)
                .collect();
            assert!(elements.contains(&vec!["Firefox".to_string(), "Linux".to_string()]));
            assert!(elements.contains(&vec!["Chrome".to_string(), "Linux".to_string()]));
        }

        it "writes nothing for an unknown version" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("versions.db");
            let disk = Database::open(path.clone()).expect("Failed to open");
            disk.migrate().expect("Failed to migrate");
            let mut categories = BTreeMap::new();
            categories.insert("OS".to_string(), vec!["OS X".to_string(), "Linux".to_string()]);
            let missing = Uuid::new_v4();

            let result = disk.attach_environment_matrix(missing, &categories);

            assert!(matches!(result, Err(Error::NotFound { id, .. }) if id == missing));
            let conn = rusqlite::Connection::open(&path).expect("Failed to open raw connection");
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM environments", [], |row| row.get(0))
                .unwrap();
            assert_eq!(count, 0);
        }

        it "reports corrupt elements instead of hiding them" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("versions.db");
            let disk = Database::open(path.clone()).expect("Failed to open");
            disk.migrate().expect("Failed to migrate");
            let product = create_product(&disk, "Some Product");
            let pv = create_version(&disk, &product, "1.0");
            let mut categories = BTreeMap::new();
            categories.insert("OS".to_string(), vec!["Linux".to_string()]);
            disk.attach_environment_matrix(pv.id, &categories).unwrap();

            let conn = rusqlite::Connection::open(&path).expect("Failed to open raw connection");
            conn.execute("UPDATE environments SET elements = 'not json'", []).unwrap();

            let result = disk.get_version_environments(pv.id);
            assert!(matches!(result, Err(Error::Storage(StorageError::Sqlite(_)))));
        }
    }

    describe "clone" {
        it "suffixes the version and prefixes the codename" {
            let product = create_product(&db, "Some Product");
            let c = db.create_version(product.id, CreateVersionInput {
                version: "1.0".to_string(),
                codename: Some("Foo".to_string()),
                ..Default::default()
            }).unwrap();

            let new = db.clone_version(c.id).unwrap();

            assert_ne!(new.id, c.id);
            assert_eq!(new.product_id, c.product_id);
            assert_eq!(new.version, "1.0.next");
            assert_eq!(new.codename, "Cloned: Foo");
            assert_eq!(db.get_version(new.id).unwrap().unwrap(), new);
        }

        it "does not clone runs" {
            let product = create_product(&db, "Some Product");
            let pv = create_version(&db, &product, "1.0");
            db.create_run(pv.id, CreateRunInput { name: "Smoke".to_string() }).unwrap();

            let new = db.clone_version(pv.id).unwrap();

            assert_eq!(db.get_runs_by_version(new.id).unwrap().len(), 0);
            assert_eq!(db.get_runs_by_version(pv.id).unwrap().len(), 1);
        }

        it "does not clone case versions" {
            let product = create_product(&db, "Some Product");
            let pv = create_version(&db, &product, "1.0");
            db.create_case_version(pv.id, CreateCaseVersionInput { name: "Login works".to_string() }).unwrap();

            let new = db.clone_version(pv.id).unwrap();

            assert_eq!(db.get_case_versions_by_version(new.id).unwrap().len(), 0);
            assert_eq!(db.get_case_versions_by_version(pv.id).unwrap().len(), 1);
        }

        it "clones environments" {
            let product = create_product(&db, "Some Product");
            let pv = create_version(&db, &product, "1.0");
            let mut categories = BTreeMap::new();
            categories.insert("OS".to_string(), vec!["OS X".to_string(), "Linux".to_string()]);
            db.attach_environment_matrix(pv.id, &categories).unwrap();

            let new = db.clone_version(pv.id).unwrap();

            let cloned = db.get_version_environments(new.id).unwrap();
            assert_eq!(cloned.len(), 2);
            assert_eq!(cloned, db.get_version_environments(pv.id).unwrap());
        }

        it "clones the team independently of the source" {
            let product = create_product(&db, "Some Product");
            let pv = db.create_version(product.id, CreateVersionInput {
                version: "1.0".to_string(),
                has_team: true,
                ..Default::default()
            }).unwrap();
            for name in ["One", "Two"] {
                let u = create_user(&db, name);
                db.add_version_team_member(pv.id, u.id).unwrap();
            }

            let new = db.clone_version(pv.id).unwrap();
            let late = create_user(&db, "Three");
            db.add_version_team_member(pv.id, late.id).unwrap();

            assert!(new.has_team);
            assert_eq!(db.get_version_team(new.id).unwrap().len(), 2);
            assert_eq!(db.get_version_team(pv.id).unwrap().len(), 3);
        }

        it "places the clone among its siblings" {
            let product = create_product(&db, "Some Product");
            let pv = create_version(&db, &product, "1.0");
            create_version(&db, &product, "1.1");

            let new = db.clone_version(pv.id).unwrap();

            assert_eq!(new.order, 2);
            assert_eq!(version_strings(&db, &product), vec!["1.0", "1.0.next", "1.1"]);
        }

        it "rolls back a clone that collides with an existing version" {
            let product = create_product(&db, "Some Product");
            let pv = create_version(&db, &product, "1.0");
            let u = create_user(&db, "alice");
            db.add_version_team_member(pv.id, u.id).unwrap();
            db.clone_version(pv.id).unwrap();

            let result = db.clone_version(pv.id);

            assert!(matches!(result, Err(Error::Storage(StorageError::Constraint(_)))));
            assert_eq!(version_strings(&db, &product), vec!["1.0", "1.0.next"]);
        }

        it "refuses a policy that copies runs" {
            let product = create_product(&db, "Some Product");
            let pv = create_version(&db, &product, "1.0");
            let policy = ClonePolicy {
                fields: ClonePolicy::product_version().fields,
                associations: vec![Association::Runs],
            };

            let result = db.clone_version_with(pv.id, &policy);

            assert!(matches!(result, Err(Error::Validation(_))));
            assert_eq!(version_strings(&db, &product), vec!["1.0"]);
        }

        it "fails for a missing source" {
            let result = db.clone_version(Uuid::new_v4());
            assert!(matches!(result, Err(Error::NotFound { .. })));
        }
    }

    describe "ordering" {
        it "reorders when adding a new version" {
            let p = create_product(&db, "Some Product");
            create_version(&db, &p, "2.11");
            create_version(&db, &p, "2.9");
            create_version(&db, &p, "2.10");

            assert_eq!(version_strings(&db, &p), vec!["2.9", "2.10", "2.11"]);
        }

        it "reorders when editing a version" {
            let p = create_product(&db, "Some Product");
            create_version(&db, &p, "2.11");
            create_version(&db, &p, "2.9");
            let pv = create_version(&db, &p, "2.12");

            let edited = db.update_version(pv.id, UpdateVersionInput {
                version: Some("2.10".to_string()),
                ..Default::default()
            }).unwrap().unwrap();

            assert_eq!(version_strings(&db, &p), vec!["2.9", "2.10", "2.11"]);
            assert_eq!(edited.order, 2);
        }

        it "updates the instance being saved" {
            let p = create_product(&db, "Some Product");
            create_version(&db, &p, "2.9");
            let pv = create_version(&db, &p, "2.10");

            assert_eq!(pv.order, 2);
        }

        it "keeps orders dense and one-based" {
            let p = create_product(&db, "Some Product");
            for v in ["1.1", "1.1a", "1.0", "2", "11", "1.1.a2", "1.1.a11"] {
                create_version(&db, &p, v);
            }

            let versions = db.get_versions_by_product(p.id).unwrap();
            let orders: Vec<i64> = versions.iter().map(|v| v.order).collect();
            assert_eq!(orders, (1..=7).collect::<Vec<i64>>());
            assert_eq!(
                versions.iter().map(|v| v.version.as_str()).collect::<Vec<_>>(),
                vec!["1.0", "1.1a", "1.1.a2", "1.1.a11", "1.1", "2", "11"]
            );
        }

        it "is idempotent" {
            let p = create_product(&db, "Some Product");
            create_version(&db, &p, "3.0");
            create_version(&db, &p, "2.0");

            let first = db.reorder_product(p.id).unwrap();
            let second = db.reorder_product(p.id).unwrap();

            assert_eq!(first, second);
        }

        it "leaves order alone when only the codename changes" {
            let p = create_product(&db, "Some Product");
            create_version(&db, &p, "1.0");
            let pv = create_version(&db, &p, "2.0");

            let edited = db.update_version(pv.id, UpdateVersionInput {
                codename: Some("Aurora".to_string()),
                ..Default::default()
            }).unwrap().unwrap();

            assert_eq!(edited.codename, "Aurora");
            assert_eq!(edited.order, 2);
        }

        it "rejects an edit that collides with a sibling" {
            let p = create_product(&db, "Some Product");
            create_version(&db, &p, "1.0");
            let pv = create_version(&db, &p, "2.0");

            let result = db.update_version(pv.id, UpdateVersionInput {
                version: Some("1.0".to_string()),
                ..Default::default()
            });

            assert!(matches!(result, Err(Error::Storage(StorageError::Constraint(_)))));
            assert_eq!(version_strings(&db, &p), vec!["1.0", "2.0"]);
        }

        it "fails to reorder a missing product" {
            let result = db.reorder_product(Uuid::new_v4());
            assert!(matches!(result, Err(Error::NotFound { entity: "product", .. })));
        }
    }

    describe "on_disk" {
        it "persists versions across reopen" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("nested").join("versions.db");

            let product_id = {
                let disk = Database::open(path.clone()).expect("Failed to open");
                disk.migrate().expect("Failed to migrate");
                let product = create_product(&disk, "Persistent");
                create_version(&disk, &product, "1.10");
                create_version(&disk, &product, "1.9");
                product.id
            };

            let reopened = Database::open(path).expect("Failed to reopen");
            reopened.migrate().expect("Failed to migrate");
            let versions: Vec<String> = reopened
                .get_versions_by_product(product_id)
                .unwrap()
                .into_iter()
                .map(|v| v.version)
                .collect();
            assert_eq!(versions, vec!["1.9", "1.10"]);
        }
    }
}
