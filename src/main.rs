// Copyright (c)  by Gleb E. Zaslavkiy
//MIT License
#![allow(non_snake_case)]
use RustedEpiSweep::Examples::sweep_examples::sweep_examples;
use RustedEpiSweep::sensitivity::task_sweep::SweepTask;
use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    // a task file as the first argument, otherwise a built-in example
    let result = match env::args().nth(1) {
        Some(path) => SweepTask::from_file(&path).and_then(|task| task.execute().map(|_| ())),
        None => {
            let example = 1;
            sweep_examples(example)
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
