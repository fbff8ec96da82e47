//! Narrow entity views and write bodies for accounts and contacts.
//!
//! Each list operation selects exactly the columns its view type declares. Each write body carries
//! only the fields the operation sets.

// crates.io
use serde::{Deserializer, de::DeserializeOwned};
// self
use crate::{_prelude::*, auth::EntityId};

/// Entity set name for accounts.
pub const ACCOUNTS: &str = "accounts";
/// Entity set name for contacts.
pub const CONTACTS: &str = "contacts";

/// Read-only projection of an entity set selected via `$select`.
pub trait EntityView: DeserializeOwned {
	/// Entity set the view is read from.
	const ENTITY_SET: &'static str;
	/// Columns requested with `$select`; must match the fields the view deserializes.
	const SELECT: &'static [&'static str];

	/// Returns `<entity set>?$select=<columns>` relative to the API root.
	fn list_path() -> String {
		format!("{}?$select={}", Self::ENTITY_SET, Self::SELECT.join(","))
	}
}

/// List wrapper returned by the service: `{ "value": [ ... ] }`.
///
/// Annotations such as `@odata.context` or `@odata.nextLink` are ignored; only the first page is
/// read.
#[derive(Clone, Debug, Deserialize)]
pub struct EntityEnvelope<T> {
	/// Records on this page, in service order.
	pub value: Vec<T>,
}
impl<T> EntityEnvelope<T> {
	/// Unwraps the records.
	pub fn into_inner(self) -> Vec<T> {
		self.value
	}
}

/// Account row as returned by the account listing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AccountSummary {
	/// Remote-assigned identifier (`accountid`).
	#[serde(rename = "accountid")]
	pub id: EntityId,
	/// Account name; `null` or an absent column decodes as empty.
	#[serde(default, deserialize_with = "null_as_empty")]
	pub name: String,
	/// Primary address city (`address1_city`); the service returns `null` when unset.
	#[serde(rename = "address1_city", default)]
	pub city: Option<String>,
}
impl EntityView for AccountSummary {
	const ENTITY_SET: &'static str = ACCOUNTS;
	const SELECT: &'static [&'static str] = &["name", "address1_city", "accountid"];
}

/// Contact row as returned by the contact listing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ContactSummary {
	/// Remote-assigned identifier (`contactid`).
	#[serde(rename = "contactid")]
	pub id: EntityId,
	/// Computed full name (`fullname`); `null` or an absent column decodes as empty.
	#[serde(rename = "fullname", default, deserialize_with = "null_as_empty")]
	pub full_name: String,
	/// Primary e-mail address (`emailaddress1`).
	#[serde(rename = "emailaddress1", default)]
	pub email: Option<String>,
}
impl EntityView for ContactSummary {
	const ENTITY_SET: &'static str = CONTACTS;
	const SELECT: &'static [&'static str] = &["fullname", "emailaddress1", "contactid"];
}

/// Body of an account creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NewAccount<'a> {
	/// Account name.
	pub name: &'a str,
}

/// Body of an account update; only the name is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AccountUpdate<'a> {
	/// Replacement account name.
	pub name: &'a str,
}

/// Body of a contact creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NewContact<'a> {
	/// Full name, written to `fullname`.
	#[serde(rename = "fullname")]
	pub full_name: &'a str,
}

/// Returns `<entity set>(<id>)` relative to the API root.
pub fn record_path(entity_set: &str, id: &EntityId) -> String {
	format!("{entity_set}({id})")
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
