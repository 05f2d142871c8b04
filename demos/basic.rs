use std::time::Duration;

use accountapi_http::{
    AccountAttributes, AccountClient, AccountData, ClientOptions, RequestContext, RetryPolicy,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = AccountClient::from_env()?.with_options(ClientOptions {
        timeout_ms: 5_000,
        retry: Some(
            RetryPolicy::builder()
                .max_retries(3)
                .base_wait(Duration::from_millis(500))
                .build(),
        ),
    });
    let ctx = RequestContext::background().with_timeout(Duration::from_secs(30));

    let account = AccountData::new(
        "ad27e265-9605-4b4b-a0e5-3003ea9cc4dc",
        "eb0bd6f5-c3f5-44b2-b677-acd23cdde73c",
        AccountAttributes {
            country: Some("GB".to_owned()),
            base_currency: Some("GBP".to_owned()),
            bank_id: Some("400300".to_owned()),
            bank_id_code: Some("GBDSC".to_owned()),
            bic: Some("NWBKGB22".to_owned()),
            name: vec!["Samantha Holder".to_owned()],
            ..AccountAttributes::default()
        },
    );

    let created = client.create(&ctx, &account).await?;
    println!("created {} (version {:?})", created.id, created.version);

    let fetched = client.fetch(&ctx, &created.id).await?;
    println!("{fetched:#?}");

    client
        .delete(&ctx, &created.id, fetched.version.unwrap_or(0))
        .await?;
    println!("deleted {}", created.id);

    Ok(())
}
