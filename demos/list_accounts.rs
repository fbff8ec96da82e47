//! Lists accounts and creates a contact against a mocked authority and Dataverse API, reusing one
//! cached token for every call.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use dataverse_broker::{
	auth::{ClientId, TenantId},
	client::EntityClient,
	config::ClientConfig,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/tenant-acme/oauth2/v2.0/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":3599}",
			);
		})
		.await;
	let _accounts_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/data/v9.2/accounts");
			then.status(200).header("content-type", "application/json").body(
				"{\"value\":[{\"name\":\"Acme\",\"address1_city\":\"Seattle\",\"accountid\":\"a-1\"}]}",
			);
		})
		.await;
	let _contacts_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/data/v9.2/contacts");
			then.status(204);
		})
		.await;
	let base = Url::parse(&server.base_url())?;
	let config = ClientConfig::builder()
		.tenant_id(TenantId::new("tenant-acme")?)
		.client_id(ClientId::new("demo-client")?)
		.client_secret("super-secret")
		.authority(base.clone())
		.api_base_url(base)
		.api_version("9.2")
		.build()?;
	let client = EntityClient::new(&config)?;

	for account in client.list_accounts().await? {
		println!("{} ({}) in {}.", account.name, account.id, account.city.as_deref().unwrap_or("-"));
	}

	client.create_contact("Jane Doe").await?;

	token_mock.assert_async().await;

	Ok(())
}
