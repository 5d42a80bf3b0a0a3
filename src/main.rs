use std::io::{self, Write};

use clap::{Parser, ValueEnum};
use ember::{debug, Chunk, ErrorFormat, OpCode, Value, Vm, VmConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Demo {
    /// -((1.2 + 3.4) / 5.6) using long constant loads
    Arithmetic,
    /// true + 1, which halts with a runtime error
    TypeError,
    /// sums 300 constants, crossing from short to long loads
    LongConstants,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Dump {
    None,
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "ember", version, about = "Assemble and run a sample bytecode chunk")]
struct Cli {
    #[arg(long, value_enum, default_value = "arithmetic")]
    demo: Demo,

    /// Disassemble the chunk to stdout before running it
    #[arg(long, value_enum, default_value = "none")]
    dump: Dump,

    /// Print the stack and each instruction as it executes
    #[arg(long)]
    trace: bool,

    #[arg(long, value_enum, default_value = "ansi")]
    error_format: ErrorFormat,

    #[arg(long)]
    color: bool,
}

fn build(demo: Demo) -> Result<Chunk, ember::ChunkError> {
    let mut chunk = Chunk::new();
    match demo {
        Demo::Arithmetic => {
            chunk.write_constant_long(Value::Number(1.2), 1)?;
            chunk.write_constant_long(Value::Number(3.4), 1)?;
            chunk.write_op(OpCode::Add, 1);
            chunk.write_constant_long(Value::Number(5.6), 2)?;
            chunk.write_op(OpCode::Divide, 2);
            chunk.write_op(OpCode::Negate, 2);
            chunk.write_op(OpCode::Return, 3);
        }
        Demo::TypeError => {
            chunk.write_op(OpCode::True, 1);
            chunk.write_constant(Value::Number(1.0), 1)?;
            chunk.write_op(OpCode::Add, 2);
            chunk.write_op(OpCode::Return, 3);
        }
        Demo::LongConstants => {
            chunk.write_constant(Value::Number(0.0), 1)?;
            for i in 1..300u32 {
                chunk.write_constant(Value::Number(i as f64), i + 1)?;
                chunk.write_op(OpCode::Add, i + 1);
            }
            chunk.write_op(OpCode::Return, 301);
        }
    }
    Ok(chunk)
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut chunk = match build(cli.demo) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error building chunk: {}", e);
            std::process::exit(1);
        }
    };

    let name = cli
        .demo
        .to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_default();
    let stdout = io::stdout();
    let dumped = match cli.dump {
        Dump::None => Ok(()),
        Dump::Text => debug::disassemble_chunk(&chunk, &name, &mut stdout.lock()),
        Dump::Json => match debug::dump_json(&chunk, &name) {
            Ok(json) => writeln!(stdout.lock(), "{}", json),
            Err(e) => {
                eprintln!("Serialization error: {}", e);
                std::process::exit(1);
            }
        },
    };
    if let Err(e) = dumped {
        eprintln!("Error writing dump: {}", e);
        std::process::exit(1);
    }

    let config = VmConfig::default()
        .with_trace(cli.trace)
        .with_error_format(cli.error_format)
        .with_color(cli.color);
    let mut vm = Vm::new(config);
    let result = vm.interpret(&chunk);
    vm.free();
    chunk.free();

    match result {
        Ok(value) => println!("{}", value),
        // the diagnostic has already been written by the VM
        Err(_) => std::process::exit(1),
    }
}
