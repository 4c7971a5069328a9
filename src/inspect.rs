use anyhow::Context as _;

use crate::cli::DnaFlattenArgs;
use crate::dna::{self, CharacterDna, DnaField};

pub fn flatten(args: DnaFlattenArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.dna)
        .with_context(|| format!("read dna: {}", args.dna))?;
    let record: CharacterDna = crate::json::decode_lenient(&raw, "DNA file")
        .with_context(|| format!("parse dna: {}", args.dna))?;
    println!("{}", dna::flatten(&record));
    Ok(())
}

pub fn fields() {
    for field in DnaField::ALL {
        let kind = if field.is_list() { "list" } else { "text" };
        println!("{}\t{}\t{kind}", field.path(), field.short_name());
    }
}
