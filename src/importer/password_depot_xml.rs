//! Password Depot 17 XML export, from both the Windows and the macOS client.

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Days, NaiveDate};
use roxmltree::{Document, Node};
use tracing::debug;

use crate::models::{CipherRecord, CipherType, FieldType, ImportResult};
use crate::normalize;

use super::base;
use super::Importer;

const UNSUPPORTED_VERSION: &str = "Unsupported export version detected - (only 17.0 is supported)";
const ENCRYPTED_FILE: &str = "Encrypted Password Depot files are not supported.";

/// Value of the `<type>` element of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryType {
    Password,
    CreditCard,
    SoftwareLicense,
    Identity,
    Information,
    Banking,
    EncryptedFile,
    Document,
    Rdp,
    Putty,
    TeamViewer,
    Certificate,
}

impl EntryType {
    fn from_code(code: &str) -> Option<Self> {
        let entry_type = match code.trim() {
            "0" => EntryType::Password,
            "1" => EntryType::CreditCard,
            "2" => EntryType::SoftwareLicense,
            "3" => EntryType::Identity,
            "4" => EntryType::Information,
            "5" => EntryType::Banking,
            "6" => EntryType::EncryptedFile,
            "7" => EntryType::Document,
            "8" => EntryType::Rdp,
            "9" => EntryType::Putty,
            "10" => EntryType::TeamViewer,
            "11" => EntryType::Certificate,
            _ => return None,
        };
        Some(entry_type)
    }

    fn cipher_type(self) -> CipherType {
        match self {
            EntryType::CreditCard => CipherType::Card,
            EntryType::Identity => CipherType::Identity,
            EntryType::SoftwareLicense | EntryType::Information | EntryType::Document => {
                CipherType::SecureNote
            }
            _ => CipherType::Login,
        }
    }
}

/// A `<field>` below `<customfields>`.
struct CustomField {
    name: String,
    value: String,
    field_type: FieldType,
}

pub struct PasswordDepot17XmlImporter {
    organization_id: Option<String>,
}

impl PasswordDepot17XmlImporter {
    pub fn new(organization_id: Option<String>) -> Self {
        Self { organization_id }
    }
}

impl Importer for PasswordDepot17XmlImporter {
    fn parse(&self, data: &str) -> ImportResult {
        let doc = match Document::parse(data) {
            Ok(doc) => doc,
            Err(e) => {
                debug!(error = %e, "not an xml document");
                return ImportResult::new();
            }
        };
        let root = doc.root_element();
        if root.tag_name().name() != "passwordfile" {
            return ImportResult::failure("Missing `passwordfile` node.");
        }
        let Some(header) = child(root, "header") else {
            return ImportResult::new();
        };
        // macOS exports carry `dataformat` in place of `version`.
        let Some(version) = child(header, "version").or_else(|| child(header, "dataformat")) else {
            return ImportResult::new();
        };
        if !text(version).starts_with("17") {
            return ImportResult::failure(UNSUPPORTED_VERSION);
        }
        if child(header, "encrypted").is_some_and(|n| text(n) == "True") {
            return ImportResult::failure(ENCRYPTED_FILE);
        }
        let Some(passwords) = child(root, "passwords") else {
            return ImportResult::failure("Missing `passwordfile > passwords` node.");
        };

        let favorites = child(root, "favorites").map(favorite_fingerprints).unwrap_or_default();
        let mut result = ImportResult::new();
        for group in children(passwords, "group") {
            traverse(&mut result, &favorites, group, None);
        }

        debug!(items = result.ciphers.len(), "parsed password depot xml");
        base::finish(result, self.organization_id.as_deref())
    }
}

/// Walk a `<group>`. Groups with a fingerprint become folders named by
/// their path; groups without one pass their items up to the parent folder.
fn traverse(
    result: &mut ImportResult,
    favorites: &HashSet<String>,
    group: Node,
    parent: Option<(usize, &str)>,
) {
    let fingerprint = group.attribute("fingerprint").unwrap_or_default();
    let folder = if fingerprint.is_empty() || fingerprint == "null" {
        parent.map(|(index, path)| (index, path.to_string()))
    } else {
        let name = group.attribute("name").unwrap_or("-");
        let path = match parent {
            Some((_, parent_path)) => format!("{}/{}", parent_path, name),
            None => name.to_string(),
        };
        Some((result.add_folder(path.clone()), path))
    };

    for entry in children(group, "item") {
        let cipher = parse_entry(favorites, entry);
        if let Some((index, _)) = &folder {
            let cipher_index = result.ciphers.len();
            result.link_folder(cipher_index, *index);
        }
        result.ciphers.push(cipher);
    }

    for nested in children(group, "group") {
        let parent = folder.as_ref().map(|(index, path)| (*index, path.as_str()));
        traverse(result, favorites, nested, parent);
    }
}

fn parse_entry(favorites: &HashSet<String>, entry: Node) -> CipherRecord {
    let mut cipher = base::init_login_cipher();
    let mut entry_type = EntryType::Password;

    for node in entry.children().filter(Node::is_element) {
        let tag = node.tag_name().name();
        match tag {
            "hitems" => continue,
            "description" => {
                cipher.name = text(node);
                continue;
            }
            "comment" => {
                cipher.notes = Some(text(node));
                continue;
            }
            "type" => {
                if let Some(parsed) = EntryType::from_code(&text(node)) {
                    entry_type = parsed;
                    cipher.set_type(parsed.cipher_type());
                }
                continue;
            }
            "customfields" => {
                parse_custom_fields(&mut cipher, entry_type, node);
                continue;
            }
            "tans" if entry_type == EntryType::Banking => {
                for tan in children(node, "tan") {
                    parse_tan(&mut cipher, tan);
                }
                continue;
            }
            "fingerprint" if favorites.contains(text(node).trim()) => cipher.favorite = true,
            _ => {}
        }
        if let Some(login) = cipher.login_mut() {
            match tag {
                "username" => {
                    login.username = Some(text(node));
                    continue;
                }
                "password" => {
                    login.password = Some(text(node));
                    continue;
                }
                "url" => {
                    login.uris = base::make_uris([text(node)]);
                    continue;
                }
                _ => {}
            }
        }
        base::process_kvp(&mut cipher, tag, &text(node), FieldType::Text);
    }

    base::cleanup_cipher(&mut cipher);
    cipher
}

fn parse_custom_fields(cipher: &mut CipherRecord, entry_type: EntryType, node: Node) {
    for field in children(node, "field").filter_map(custom_field) {
        let value = Some(field.value.clone());
        let filled = match entry_type {
            EntryType::CreditCard => match field.name.as_str() {
                "IDS_CardExpires" => base::set_card_expiration(cipher, &field.value),
                name => cipher.card_mut().is_some_and(|card| {
                    match name {
                        "IDS_CardHolder" => card.cardholder_name = value,
                        "IDS_CardNumber" => {
                            card.brand = normalize::card_brand(&field.value).map(str::to_string);
                            card.number = value;
                        }
                        "IDS_CardCode" => card.code = value,
                        _ => return false,
                    }
                    true
                }),
            },
            EntryType::Identity if field.name == "IDS_IdentityName" => {
                base::process_full_name(cipher, &field.value);
                true
            }
            EntryType::Identity => cipher.identity_mut().is_some_and(|identity| {
                let slot = match field.name.as_str() {
                    "IDS_IdentityEmail" => &mut identity.email,
                    "IDS_IdentityFirstName" => &mut identity.first_name,
                    "IDS_IdentityLastName" => &mut identity.last_name,
                    "IDS_IdentityCompany" => &mut identity.company,
                    "IDS_IdentityAddress1" => &mut identity.address1,
                    "IDS_IdentityAddress2" => &mut identity.address2,
                    "IDS_IdentityCity" => &mut identity.city,
                    "IDS_IdentityState" => &mut identity.state,
                    "IDS_IdentityZIP" => &mut identity.postal_code,
                    "IDS_IdentityCountry" => &mut identity.country,
                    "IDS_IdentityPhone" => &mut identity.phone,
                    _ => return false,
                };
                *slot = value;
                true
            }),
            EntryType::Information if field.name == "IDS_InformationText" => {
                cipher.notes = value;
                true
            }
            _ => false,
        };
        if !filled {
            base::process_kvp(cipher, &field.name, &field.value, field.field_type);
        }
    }
}

/// Windows exports use `<name>`/`<value>`/`<type>`/`<visible>` children,
/// macOS exports put the same keys in attributes.
fn custom_field(node: Node) -> Option<CustomField> {
    let lookup = |key: &str| -> Option<String> {
        if node.attributes().len() > 0 {
            node.attribute(key).map(str::to_string)
        } else {
            child(node, key).map(text)
        }
    };
    let name = lookup("name")?;
    let mut value = lookup("value").unwrap_or_default();
    let kind = lookup("type").unwrap_or_else(|| "1".to_string());

    let field_type = match kind.trim() {
        "0" => FieldType::Hidden,
        "4" => FieldType::Boolean,
        _ if lookup("visible").as_deref() == Some("0") => FieldType::Hidden,
        _ => FieldType::Text,
    };
    if kind.trim() == "2" {
        if let Some(date) = value.trim().parse::<u64>().ok().and_then(serial_date) {
            value = date;
        }
    }
    Some(CustomField {
        name,
        value,
        field_type,
    })
}

/// Spreadsheet-style day number (days since 1899-12-30) as `M/D/YYYY`.
fn serial_date(days: u64) -> Option<String> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_days(Days::new(days))?;
    Some(date.format("%-m/%-d/%Y").to_string())
}

fn parse_tan(cipher: &mut CipherRecord, tan: Node) {
    let number = child(tan, "number").map(text).unwrap_or_else(|| "0".to_string());
    for node in tan.children().filter(Node::is_element) {
        let tag = node.tag_name().name();
        if tag == "number" {
            continue;
        }
        base::process_kvp(cipher, &format!("tan_{}_{}", number, tag), &text(node), FieldType::Text);
    }
}

/// `<favorites>` holds base64 of newline-separated entry fingerprints.
fn favorite_fingerprints(node: Node) -> HashSet<String> {
    let encoded: String = text(node).split_whitespace().collect();
    let Ok(decoded) = STANDARD.decode(encoded) else {
        debug!("favorites list is not base64");
        return HashSet::new();
    };
    String::from_utf8_lossy(&decoded)
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.is_element() && n.tag_name().name() == name)
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

/// All text below `node`, like the DOM's `textContent`.
fn text(node: Node) -> String {
    node.descendants().filter(Node::is_text).filter_map(|n| n.text()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    fn export(header_version: &str, body: &str) -> String {
        let favorites = STANDARD.encode("FP-2\r\nFP-3\r\n");
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<passwordfile xmlns="https://www.password-depot.de/schemas/passwordfile/17.0/passwordfile.xsd">
  <header>
    {header_version}
    <encrypted>False</encrypted>
  </header>
  <passwords>{body}</passwords>
  <favorites>{favorites}</favorites>
</passwordfile>"#
        )
    }

    const WINDOWS_BODY: &str = r#"
    <group name="tempDB" fingerprint="G-1">
      <item>
        <description>password type</description>
        <type>0</type>
        <password>p6J&lt;]fmj</password>
        <username>someUser</username>
        <url>example.com</url>
        <comment>someComment</comment>
        <expirydate FMT="dd.MM.yyyy">07.05.2025</expirydate>
        <fingerprint>FP-1</fingerprint>
        <hitems><hitem><password>old</password></hitem></hitems>
        <customfields>
          <field><name>passwort</name><value>password</value><visible>0</visible><type>0</type></field>
          <field><name>datum</name><value>45790</value><visible>0</visible><type>2</type></field>
          <field><name>boolean</name><value>1</value><visible>1</visible><type>4</type></field>
          <field><name>memo</name><value>memo</value><visible>1</visible><type>1</type></field>
        </customfields>
      </item>
      <item>
        <description>some CreditCard</description>
        <type>1</type>
        <fingerprint>FP-2</fingerprint>
        <customfields>
          <field><name>IDS_CardHolder</name><value>some CC holder</value><visible>1</visible><type>1</type></field>
          <field><name>IDS_CardNumber</name><value>4222422242224222</value><visible>1</visible><type>1</type></field>
          <field><name>IDS_CardExpires</name><value>05/2026</value><visible>1</visible><type>1</type></field>
          <field><name>IDS_CardCode</name><value>123</value><visible>1</visible><type>1</type></field>
        </customfields>
      </item>
      <group name="nested" fingerprint="G-2">
        <item>
          <description>information type</description>
          <type>4</type>
          <fingerprint>FP-3</fingerprint>
          <customfields>
            <field><name>IDS_InformationText</name><value>content</value><type>1</type></field>
          </customfields>
        </item>
      </group>
    </group>"#;

    #[test]
    fn windows_export() {
        let data = export("<version>17.0.0</version>", WINDOWS_BODY);
        let result = PasswordDepot17XmlImporter::new(None).parse(&data);
        assert!(result.success, "{:?}", result.error_message);
        assert_eq!(result.ciphers.len(), 3);

        let folders: Vec<&str> = result.folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(folders, ["tempDB", "tempDB/nested"]);
        assert_eq!(result.folder_relationships(), &[(0, 0), (1, 0), (2, 1)]);

        let login = &result.ciphers[0];
        assert!(!login.favorite);
        assert_eq!(login.notes.as_deref(), Some("someComment"));
        assert_eq!(login.login().unwrap().password.as_deref(), Some("p6J<]fmj"));
        assert_eq!(login.login().unwrap().uris[0].uri.as_deref(), Some("http://example.com"));
        assert_eq!(
            login.fields,
            vec![
                Field::text("expirydate", "07.05.2025"),
                Field::text("fingerprint", "FP-1"),
                Field::hidden("passwort", "password"),
                Field::hidden("datum", "5/13/2025"),
                Field::new("boolean", "1", FieldType::Boolean),
                Field::text("memo", "memo"),
            ]
        );

        let card_cipher = &result.ciphers[1];
        assert!(card_cipher.favorite);
        let card = card_cipher.card().unwrap();
        assert_eq!(card.cardholder_name.as_deref(), Some("some CC holder"));
        assert_eq!(card.brand.as_deref(), Some("Visa"));
        assert_eq!(card.exp_month.as_deref(), Some("5"));
        assert_eq!(card.exp_year.as_deref(), Some("2026"));
        assert_eq!(card.code.as_deref(), Some("123"));

        let info = &result.ciphers[2];
        assert_eq!(info.cipher_type(), CipherType::SecureNote);
        assert_eq!(info.notes.as_deref(), Some("content"));
    }

    #[test]
    fn macos_attributes_and_unnamed_root_group() {
        let body = r#"
        <group name="null" fingerprint="null">
          <item>
            <description>identity</description>
            <type>3</type>
            <customfields>
              <field name="IDS_IdentityName" value="Ada King Lovelace" visible="1" />
              <field name="IDS_IdentityEmail" value="ada@example.com" visible="1" />
              <field name="IDS_IdentityWebsite" value="web" visible="1" />
            </customfields>
          </item>
        </group>"#;
        let result = PasswordDepot17XmlImporter::new(None).parse(&export("<dataformat>17</dataformat>", body));
        assert!(result.success);
        assert!(result.folders.is_empty());
        let identity = result.ciphers[0].identity().unwrap();
        assert_eq!(identity.first_name.as_deref(), Some("Ada"));
        assert_eq!(identity.middle_name.as_deref(), Some("King"));
        assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
        assert_eq!(result.ciphers[0].fields, vec![Field::text("IDS_IdentityWebsite", "web")]);
    }

    #[test]
    fn rejects_other_versions_and_encrypted_files() {
        let old = PasswordDepot17XmlImporter::new(None).parse(&export("<version>16.0</version>", ""));
        assert!(!old.success);
        assert_eq!(old.error_message.as_deref(), Some(UNSUPPORTED_VERSION));

        let encrypted = export("<version>17.0</version>", "")
            .replace("<encrypted>False</encrypted>", "<encrypted>True</encrypted>");
        let result = PasswordDepot17XmlImporter::new(None).parse(&encrypted);
        assert_eq!(result.error_message.as_deref(), Some(ENCRYPTED_FILE));

        assert!(!PasswordDepot17XmlImporter::new(None).parse("<other/>").success);
        assert!(!PasswordDepot17XmlImporter::new(None).parse("not xml").success);
    }

    #[test]
    fn organization_import_gets_collections() {
        let data = export("<version>17.0.0</version>", WINDOWS_BODY);
        let result = PasswordDepot17XmlImporter::new(Some("org".into())).parse(&data);
        assert!(result.folders.is_empty());
        assert_eq!(result.collections.len(), 2);
        assert_eq!(result.collections[0].name, "tempDB");
    }
}
