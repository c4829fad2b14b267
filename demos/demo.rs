//! Quick demo: register a gateway and run the basic command surface.
//!
//! Expects `tablewerk.toml` (or `TABLEWERK_CONFIG`) pointing at a
//! reachable PostgreSQL and Redis.

use tablewerk::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::load()?;
    let mut werk = Tablewerk::from_config(config).await?;
    werk.health_check().await?;

    let users = werk.register_model("User")?;
    println!("gateway table: {}", users.table_name());

    // create the backing table for the demo run
    users
        .execute(
            "CREATE TABLE IF NOT EXISTS __TABLE__ (id serial PRIMARY KEY, name varchar(64), logins integer DEFAULT 0)",
            SqlArgs::Tokens,
        )
        .await?;

    let added = users
        .add(Row::new().with("name", "Jane Doe"), Query::new())
        .await?;
    println!("added: {:?}", added);

    let jane = users
        .find(Query::new().where_eq("name", "Jane Doe").cached())
        .await?;
    println!("found: {:?}", jane);

    // three bumps, one write: the lazy window coalesces them
    for _ in 0..3 {
        let outcome = users
            .set_inc(
                Query::new().where_eq("name", "Jane Doe"),
                "logins",
                1,
                Some(30),
            )
            .await?;
        println!("counter: {:?}", outcome);
    }

    let names = users
        .get_field(Query::new(), "id,name", Separator::Glue(",".into()))
        .await?;
    println!("directory: {:?}", names);

    Ok(())
}
