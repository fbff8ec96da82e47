// crates.io
use reqwest::Method;
// self
use crate::_prelude::*;

/// Entity operations exposed by [`EntityClient`](crate::client::EntityClient).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// `GET accounts?$select=...`
	ListAccounts,
	/// `GET contacts?$select=...`
	ListContacts,
	/// `POST accounts`
	CreateAccount,
	/// `POST contacts`
	CreateContact,
	/// `PATCH accounts(<id>)`
	UpdateAccount,
	/// `DELETE accounts(<id>)`
	DeleteAccount,
}
impl Operation {
	/// Every operation, in declaration order.
	pub const ALL: [Self; 6] = [
		Self::ListAccounts,
		Self::ListContacts,
		Self::CreateAccount,
		Self::CreateContact,
		Self::UpdateAccount,
		Self::DeleteAccount,
	];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ListAccounts => "list_accounts",
			Self::ListContacts => "list_contacts",
			Self::CreateAccount => "create_account",
			Self::CreateContact => "create_contact",
			Self::UpdateAccount => "update_account",
			Self::DeleteAccount => "delete_account",
		}
	}

	/// Fixed summary reported when the remote service rejects the operation.
	pub const fn failure_message(self) -> &'static str {
		match self {
			Self::ListAccounts => "Failed to load accounts",
			Self::ListContacts => "Failed to load contacts",
			Self::CreateAccount => "Failed to create account",
			Self::CreateContact => "Failed to create contact",
			Self::UpdateAccount => "Failed to update account",
			Self::DeleteAccount => "Failed to delete account",
		}
	}

	/// HTTP method the operation is sent with.
	pub fn method(self) -> Method {
		match self {
			Self::ListAccounts | Self::ListContacts => Method::GET,
			Self::CreateAccount | Self::CreateContact => Method::POST,
			Self::UpdateAccount => Method::PATCH,
			Self::DeleteAccount => Method::DELETE,
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn labels_are_unique_and_messages_are_fixed() {
		let mut labels = Operation::ALL.map(Operation::as_str).to_vec();

		labels.sort_unstable();
		labels.dedup();

		assert_eq!(labels.len(), Operation::ALL.len());
		assert_eq!(Operation::ListContacts.to_string(), "list_contacts");
		assert_eq!(Operation::DeleteAccount.failure_message(), "Failed to delete account");
		assert_eq!(Operation::UpdateAccount.method(), Method::PATCH);
	}
}
