//! End-to-end example: CoNLL-U -> tree -> tuples
//!
//! Parses a small corpus, runs the built-in English adjective and verb
//! libraries over it and prints what each library found.
//!
//! Run with: cargo run --example extract_sentence

use treetuples::{Catalog, Corpus, Miner};

fn main() {
    let conllu_text = r#"# sent_id = example-001
# text = The tall man did not clap.
1	The	the	DET	DT	Definite=Def|PronType=Art	3	det	_	_
2	tall	tall	ADJ	JJ	Degree=Pos	3	amod	_	_
3	man	man	NOUN	NN	Number=Sing	6	nsubj	_	_
4	did	do	AUX	VBD	_	6	aux	_	_
5	not	not	PART	RB	_	6	neg	_	_
6	clap	clap	VERB	VB	VerbForm=Inf	0	ROOT	_	SpaceAfter=No
7	.	.	PUNCT	.	_	6	punct	_	_

"#;

    let catalog = match Catalog::english() {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Catalogue error: {}", e);
            return;
        }
    };
    let miner = match Miner::new(&catalog, &["adj", "verb"]) {
        Ok(miner) => miner,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    // Malformed sentences are logged and skipped by the corpus
    for tree in Corpus::from_string(conllu_text) {
        println!("Parsed tree with {} nodes: {}", tree.len(), tree.text());
        match miner.mine_tree(&tree) {
            Ok(results) => {
                for (library, tuples) in results {
                    println!("\n[{}] {} tuple(s)", library, tuples.len());
                    for tuple in tuples {
                        println!("  {}", tuple);
                    }
                }
            }
            Err(e) => eprintln!("Invalid tree: {}", e),
        }
    }
}
