use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use crate::api::HttpImportApi;
use crate::crypto::SymmetricKey;
use crate::importer::ImportFormat;
use crate::models::{Card, CipherType};
use crate::normalize::{is_card_expired, parse_year_month_expiry};
use crate::service::{
    prepare, ImportOptions, ImportService, ImportTarget, SymmetricKeyEncryptor,
};
use crate::storage::{Config, ConfigStore};

pub fn cmd_formats() -> Result<()> {
    for format in ImportFormat::ALL {
        let marker = if format.requires_password() {
            " [password]"
        } else {
            ""
        };
        println!("{:<28}{}{}", format.id(), format.display_name(), marker);
    }
    Ok(())
}

pub struct ImportArgs<'a> {
    pub format: &'a str,
    pub file: &'a Path,
    pub organization: Option<&'a str>,
    pub password: Option<&'a str>,
    pub folder: Option<&'a str>,
    pub collection: Option<&'a str>,
    pub dry_run: bool,
}

pub fn cmd_import(args: &ImportArgs<'_>) -> Result<()> {
    let store = ConfigStore::new()?;
    let config = store.load_config()?;

    let format: ImportFormat = args.format.parse().map_err(anyhow::Error::msg)?;
    let organization = store.resolve_organization(args.organization)?;
    let org = organization.as_deref();

    let importer = format.importer(org, args.password).with_context(|| {
        format!(
            "{} files are password protected -- pass the file password with --password",
            format.display_name()
        )
    })?;

    let contents = fs::read_to_string(args.file)
        .with_context(|| format!("Could not read {}", args.file.display()))?;
    let options = import_options(&config, args.folder, args.collection)?;

    if args.dry_run {
        let result = prepare(importer.as_ref(), &contents, org, &options).map_err(password_hint)?;
        let items: Vec<_> = result
            .ciphers
            .iter()
            .map(|c| json!({ "name": c.name, "type": c.cipher_type().display_name() }))
            .collect();
        let folders: Vec<&str> = result.folders.iter().map(|f| f.name.as_str()).collect();
        let collections: Vec<&str> = result.collections.iter().map(|c| c.name.as_str()).collect();
        let summary = json!({
            "format": format.id(),
            "organizationId": org,
            "items": items,
            "folders": folders,
            "collections": collections,
            "folderRelationships": result.folder_relationships(),
            "collectionRelationships": result.collection_relationships(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let creds = store.load_credentials()?;
    let token = creds
        .access_token
        .as_deref()
        .context("No access token. Run `vault-import config set access_token <token>` first.")?;
    let encoded_key = match org {
        Some(org) => creds.organization_keys.get(org).with_context(|| {
            format!(
                "No key for organization '{}'. Run `vault-import config set organization_key.{} <key>`.",
                org, org
            )
        })?,
        None => creds
            .user_key
            .as_ref()
            .context("No user key. Run `vault-import config set user_key <key>` first.")?,
    };
    let key = SymmetricKey::from_base64(encoded_key).context("Stored vault key is unusable")?;

    let service = ImportService::new(
        SymmetricKeyEncryptor::new(key),
        HttpImportApi::new(&config.api_url, token),
    );

    eprintln!(
        "Importing {} from {}...",
        format.display_name(),
        args.file.display()
    );
    let summary = service
        .import(importer.as_ref(), &contents, org, &options)
        .map_err(password_hint)?;

    eprintln!(
        "Imported {} items, {} folders, {} collections.",
        summary.ciphers, summary.folders, summary.collections
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn import_options(
    config: &Config,
    folder: Option<&str>,
    collection: Option<&str>,
) -> Result<ImportOptions> {
    let target = match (folder, collection) {
        (Some(_), Some(_)) => anyhow::bail!("Use either --folder or --collection, not both"),
        (Some(name), None) => Some(ImportTarget::Folder(name.to_string())),
        (None, Some(name)) => Some(ImportTarget::Collection(name.to_string())),
        (None, None) => None,
    };
    let restricted_types = config
        .restricted_types
        .iter()
        .map(|name| {
            CipherType::from_name(name)
                .with_context(|| format!("Unknown item type '{}' in restricted_types", name))
        })
        .collect::<Result<Vec<_>>>()?;

    // Whoever holds the organization key here can manage its imports.
    Ok(ImportOptions {
        target,
        restricted_types,
        can_manage_import: true,
    })
}

fn password_hint(err: crate::error::ImportError) -> anyhow::Error {
    if err.is_missing_password() {
        anyhow::anyhow!("{} (the file is password protected, pass --password)", err)
    } else {
        err.into()
    }
}

pub fn cmd_expiry(value: &str) -> Result<()> {
    let (year, month) = parse_year_month_expiry(value);
    let card = Card {
        exp_year: year.clone(),
        exp_month: month.clone(),
        ..Card::default()
    };
    let out = json!({
        "year": year,
        "month": month,
        "expired": is_card_expired(&card),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

// -- Config -------------------------------------------------------------------

pub fn cmd_config_show() -> Result<()> {
    let store = ConfigStore::new()?;
    let config = store.load_config()?;
    let creds = store.load_credentials()?;

    println!("api_url = {}", config.api_url);
    println!(
        "default_organization = {}",
        config.default_organization.as_deref().unwrap_or("(none)")
    );
    println!("restricted_types = [{}]", config.restricted_types.join(", "));
    println!("access_token = {}", mask(creds.access_token.as_deref()));
    println!("user_key = {}", mask(creds.user_key.as_deref()));
    for (org, key) in &creds.organization_keys {
        println!("organization_key.{} = {}", org, mask(Some(key)));
    }
    Ok(())
}

pub fn cmd_config_set(key: &str, value: &str) -> Result<()> {
    let store = ConfigStore::new()?;
    store.set(key, value)?;
    eprintln!("Saved {}.", key);
    Ok(())
}

fn mask(secret: Option<&str>) -> String {
    match secret {
        None => "(not set)".to_string(),
        Some(s) => {
            let prefix: String = s.chars().take(4).collect();
            format!("{}****", prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask(None), "(not set)");
        assert_eq!(mask(Some("abcdefgh")), "abcd****");
        assert_eq!(mask(Some("ab")), "ab****");
    }

    #[test]
    fn options_from_config() {
        let config = Config {
            restricted_types: vec!["Card".into(), "Secure Note".into()],
            ..Config::default()
        };
        let options = import_options(&config, Some("Inbox"), None).unwrap();
        assert_eq!(options.target, Some(ImportTarget::Folder("Inbox".into())));
        assert_eq!(options.restricted_types, [CipherType::Card, CipherType::SecureNote]);

        assert!(import_options(&config, Some("a"), Some("b")).is_err());

        let bad = Config {
            restricted_types: vec!["spaceship".into()],
            ..Config::default()
        };
        assert!(import_options(&bad, None, None).is_err());
    }
}
