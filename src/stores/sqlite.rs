//! SQLite-backed knowledge store for licenses, packages, and the
//! compatibility matrix.
//!
//! Columns are TEXT throughout and parsed at read time; numeric and
//! boolean values are stored in their string form. Every SQLite failure
//! is mapped to [`LicenseerError::Storage`].

use async_trait::async_trait;
use std::path::Path;
use tokio_rusqlite::{Connection, OptionalExtension};

use super::{CompatibilityStore, LicenseStore, PackageStore};
use crate::model::{License, LicenseCategory, LicenseSummary, Package, PackageInfo};
use crate::types::LicenseerError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS licenses (
    spdx_id     TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    category    TEXT NOT NULL,
    content     TEXT NOT NULL,
    version     TEXT,
    submitter   TEXT,
    steward     TEXT,
    steward_url TEXT,
    source_url  TEXT
);
CREATE TABLE IF NOT EXISTS packages (
    name             TEXT PRIMARY KEY,
    description      TEXT,
    homepage         TEXT,
    repository_url   TEXT,
    dependents_count TEXT,
    keywords         TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS package_licenses (
    package_name TEXT NOT NULL,
    spdx_id      TEXT NOT NULL,
    PRIMARY KEY (package_name, spdx_id)
);
CREATE TABLE IF NOT EXISTS license_compatibility (
    source_id     TEXT NOT NULL,
    target_id     TEXT NOT NULL,
    is_compatible TEXT NOT NULL,
    PRIMARY KEY (source_id, target_id)
);
";

/// Shared handle over one SQLite database holding the whole knowledge
/// base. Cloning is cheap; all clones share the connection.
#[derive(Clone)]
pub struct SqliteKnowledgeStore {
    conn: Connection,
}

impl SqliteKnowledgeStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LicenseerError> {
        let conn = Connection::open(path)
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))?;
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| LicenseerError::Storage(err.to_string()))?;
        Ok(Self { conn })
    }

    /// Underlying connection for queries not covered by the store traits.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl LicenseStore for SqliteKnowledgeStore {
    async fn upsert_license(&self, license: &License) -> Result<(), LicenseerError> {
        let license = license.clone();
        self.conn
            .call(move |conn| {
                let category = license.category.to_string();
                conn.execute(
                    "INSERT INTO licenses \
                     (spdx_id, name, category, content, version, submitter, steward, steward_url, source_url) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                     ON CONFLICT(spdx_id) DO UPDATE SET \
                       name = excluded.name, category = excluded.category, \
                       content = excluded.content, version = excluded.version, \
                       submitter = excluded.submitter, steward = excluded.steward, \
                       steward_url = excluded.steward_url, source_url = excluded.source_url",
                    [
                        Some(license.spdx_id.as_str()),
                        Some(license.name.as_str()),
                        Some(category.as_str()),
                        Some(license.text.as_str()),
                        license.version.as_deref(),
                        license.submitter.as_deref(),
                        license.steward.as_deref(),
                        license.steward_url.as_deref(),
                        license.source_url.as_deref(),
                    ],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }

    async fn get_license(&self, spdx_id: &str) -> Result<Option<License>, LicenseerError> {
        let spdx_id = spdx_id.to_string();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT spdx_id, name, category, content, version, submitter, steward, \
                     steward_url, source_url FROM licenses WHERE spdx_id = ?1",
                    [spdx_id.as_str()],
                    |row| {
                        Ok(License {
                            spdx_id: row.get(0)?,
                            name: row.get(1)?,
                            category: LicenseCategory::parse(&row.get::<_, String>(2)?),
                            text: row.get(3)?,
                            version: row.get(4)?,
                            submitter: row.get(5)?,
                            steward: row.get(6)?,
                            steward_url: row.get(7)?,
                            source_url: row.get(8)?,
                        })
                    },
                )
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }

    async fn list_licenses(&self) -> Result<Vec<License>, LicenseerError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT spdx_id, name, category, content, version, submitter, steward, \
                         steward_url, source_url FROM licenses",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(License {
                            spdx_id: row.get(0)?,
                            name: row.get(1)?,
                            category: LicenseCategory::parse(&row.get::<_, String>(2)?),
                            text: row.get(3)?,
                            version: row.get(4)?,
                            submitter: row.get(5)?,
                            steward: row.get(6)?,
                            steward_url: row.get(7)?,
                            source_url: row.get(8)?,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut licenses = Vec::new();
                for row in rows {
                    licenses.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(licenses)
            })
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }
}

#[async_trait]
impl PackageStore for SqliteKnowledgeStore {
    async fn upsert_package(&self, package: &Package) -> Result<(), LicenseerError> {
        let package = package.clone();
        self.conn
            .call(move |conn| {
                let dependents = package.dependents_count.map(|count| count.to_string());
                let keywords = serde_json::to_string(&package.keywords)
                    .unwrap_or_else(|_| "[]".to_string());
                conn.execute(
                    "INSERT INTO packages \
                     (name, description, homepage, repository_url, dependents_count, keywords) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                     ON CONFLICT(name) DO UPDATE SET \
                       description = excluded.description, homepage = excluded.homepage, \
                       repository_url = excluded.repository_url, \
                       dependents_count = excluded.dependents_count, \
                       keywords = excluded.keywords",
                    [
                        Some(package.name.as_str()),
                        package.description.as_deref(),
                        package.homepage.as_deref(),
                        package.repository_url.as_deref(),
                        dependents.as_deref(),
                        Some(keywords.as_str()),
                    ],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }

    async fn get_package(&self, name: &str) -> Result<Option<PackageInfo>, LicenseerError> {
        let name = name.to_string();
        self.conn
            .call(move |conn| {
                let package = conn
                    .query_row(
                        "SELECT name, description, homepage, repository_url, dependents_count, \
                         keywords FROM packages WHERE name = ?1",
                        [name.as_str()],
                        |row| {
                            Ok(Package {
                                name: row.get(0)?,
                                description: row.get(1)?,
                                homepage: row.get(2)?,
                                repository_url: row.get(3)?,
                                dependents_count: row
                                    .get::<_, Option<String>>(4)?
                                    .and_then(|raw| raw.parse().ok()),
                                keywords: row
                                    .get::<_, String>(5)
                                    .map(|raw| serde_json::from_str(&raw).unwrap_or_default())?,
                            })
                        },
                    )
                    .optional()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let Some(package) = package else {
                    return Ok(None);
                };

                let mut stmt = conn
                    .prepare(
                        "SELECT l.spdx_id, l.name, l.category, l.version \
                         FROM package_licenses pl \
                         JOIN licenses l ON l.spdx_id = pl.spdx_id \
                         WHERE pl.package_name = ?1 \
                         ORDER BY l.spdx_id",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([name.as_str()], |row| {
                        Ok(LicenseSummary {
                            spdx_id: row.get(0)?,
                            name: row.get(1)?,
                            category: LicenseCategory::parse(&row.get::<_, String>(2)?),
                            version: row.get(3)?,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut licenses = Vec::new();
                for row in rows {
                    licenses.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }

                Ok(Some(PackageInfo { package, licenses }))
            })
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }

    async fn attach_license(
        &self,
        package_name: &str,
        spdx_id: &str,
    ) -> Result<(), LicenseerError> {
        let package_name = package_name.to_string();
        let spdx_id = spdx_id.to_string();
        self.conn
            .call(move |conn| {
                // Mirror the source system's MATCH + MERGE: assert nothing
                // when either endpoint is missing.
                let package_exists: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM packages WHERE name = ?1)",
                        [package_name.as_str()],
                        |row| row.get(0),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let license_exists: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM licenses WHERE spdx_id = ?1)",
                        [spdx_id.as_str()],
                        |row| row.get(0),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                if package_exists && license_exists {
                    conn.execute(
                        "INSERT OR IGNORE INTO package_licenses (package_name, spdx_id) \
                         VALUES (?1, ?2)",
                        [package_name.as_str(), spdx_id.as_str()],
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                Ok(())
            })
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }
}

#[async_trait]
impl CompatibilityStore for SqliteKnowledgeStore {
    async fn set_compatibility(
        &self,
        source_id: &str,
        target_id: &str,
        is_compatible: bool,
    ) -> Result<(), LicenseerError> {
        let source_id = source_id.to_string();
        let target_id = target_id.to_string();
        self.conn
            .call(move |conn| {
                let flag = if is_compatible { "1" } else { "0" };
                conn.execute(
                    "INSERT INTO license_compatibility (source_id, target_id, is_compatible) \
                     VALUES (?1, ?2, ?3) \
                     ON CONFLICT(source_id, target_id) DO UPDATE SET \
                       is_compatible = excluded.is_compatible",
                    [source_id.as_str(), target_id.as_str(), flag],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }

    async fn get_compatibility(
        &self,
        source_id: &str,
        target_id: &str,
    ) -> Result<Option<bool>, LicenseerError> {
        let source_id = source_id.to_string();
        let target_id = target_id.to_string();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT is_compatible FROM license_compatibility \
                     WHERE source_id = ?1 AND target_id = ?2",
                    [source_id.as_str(), target_id.as_str()],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map(|raw| raw.map(|flag| flag == "1"))
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open_store() -> (tempfile::TempDir, SqliteKnowledgeStore) {
        let dir = tempdir().unwrap();
        let store = SqliteKnowledgeStore::open(dir.path().join("kb.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn mit() -> License {
        License::new(
            "MIT",
            "MIT License",
            LicenseCategory::Permissive,
            "Permission is hereby granted, free of charge...",
        )
        .with_version("1.0")
    }

    #[tokio::test]
    async fn license_upsert_round_trips() {
        let (_dir, store) = open_store().await;
        let license = mit();
        store.upsert_license(&license).await.unwrap();
        let fetched = store.get_license("MIT").await.unwrap().unwrap();
        assert_eq!(fetched, license);
    }

    #[tokio::test]
    async fn license_upsert_replaces_all_fields() {
        let (_dir, store) = open_store().await;
        store.upsert_license(&mit()).await.unwrap();
        let updated = License::new("MIT", "MIT License (revised)", LicenseCategory::Permissive, "new text");
        store.upsert_license(&updated).await.unwrap();
        let fetched = store.get_license("MIT").await.unwrap().unwrap();
        assert_eq!(fetched.name, "MIT License (revised)");
        assert_eq!(fetched.text, "new text");
        assert_eq!(fetched.version, None);
    }

    #[tokio::test]
    async fn missing_license_is_none() {
        let (_dir, store) = open_store().await;
        assert!(store.get_license("GPL-3.0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn package_with_attached_licenses_round_trips() {
        let (_dir, store) = open_store().await;
        store.upsert_license(&mit()).await.unwrap();
        let package = Package::new("requests").with_description("HTTP for humans");
        store.upsert_package(&package).await.unwrap();
        store.attach_license("requests", "MIT").await.unwrap();
        // Duplicate attach is a no-op.
        store.attach_license("requests", "MIT").await.unwrap();

        let info = store.get_package("requests").await.unwrap().unwrap();
        assert_eq!(info.package.name, "requests");
        assert_eq!(info.licenses.len(), 1);
        assert_eq!(info.licenses[0].spdx_id, "MIT");
    }

    #[tokio::test]
    async fn attach_against_missing_side_asserts_nothing() {
        let (_dir, store) = open_store().await;
        store.upsert_package(&Package::new("lonely")).await.unwrap();
        store.attach_license("lonely", "GPL-3.0").await.unwrap();
        store.attach_license("ghost", "GPL-3.0").await.unwrap();
        let info = store.get_package("lonely").await.unwrap().unwrap();
        assert!(info.licenses.is_empty());
    }

    #[tokio::test]
    async fn unknown_compatibility_is_none_not_error() {
        let (_dir, store) = open_store().await;
        assert_eq!(store.get_compatibility("MIT", "GPL-3.0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn compatibility_is_directed_and_upserts() {
        let (_dir, store) = open_store().await;
        store.set_compatibility("MIT", "GPL-3.0", true).await.unwrap();
        assert_eq!(
            store.get_compatibility("MIT", "GPL-3.0").await.unwrap(),
            Some(true)
        );
        // No reverse edge was asserted.
        assert_eq!(store.get_compatibility("GPL-3.0", "MIT").await.unwrap(), None);

        store.set_compatibility("MIT", "GPL-3.0", false).await.unwrap();
        assert_eq!(
            store.get_compatibility("MIT", "GPL-3.0").await.unwrap(),
            Some(false)
        );
    }

    #[tokio::test]
    async fn self_pair_is_legal_when_set_explicitly() {
        let (_dir, store) = open_store().await;
        store.set_compatibility("MIT", "MIT", true).await.unwrap();
        assert_eq!(store.get_compatibility("MIT", "MIT").await.unwrap(), Some(true));
    }
}
