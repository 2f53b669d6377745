// ─────────────────────────────────────────────────────────────────────────────
//  Mizan: Address Risk Scale
//  Part of DarkBlock Watch.
//
//  Mizan (ميزان): "The Scale". Weighs an address by the company it keeps,
//  following funds through the transaction graph toward known bad actors.
//
//  Every score comes with the factors that produced it.
// ─────────────────────────────────────────────────────────────────────────────

use clap::Parser;
use darkblock::engine::mizan::Mizan;
use darkblock::engine::mizan::MizanArgs;
use darkblock::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    Mizan::run(MizanArgs::parse()).await?;
    Ok(())
}
