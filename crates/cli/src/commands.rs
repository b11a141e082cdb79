use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Copy tables from the source connection to the destination
    Sync {
        #[arg(long, help = "Config file path; defaults to SOURCE/DESTINATION from the environment")]
        config: Option<String>,

        #[arg(long, help = "Load variables from this .env file before expanding the config")]
        env_file: Option<String>,

        #[arg(
            long,
            help = "If specified, writes the JSON run report to this file instead of stdout"
        )]
        output: Option<String>,
    },
    /// List the tables of a connection
    Tables {
        /// Connection type: "pg", "csv", …
        #[arg(long = "type")]
        kind: String,

        /// Connection string or directory
        #[arg(long)]
        conn_str: String,
    },
    /// List the columns of one table, primary key first
    Columns {
        #[arg(long = "type")]
        kind: String,

        #[arg(long)]
        conn_str: String,

        #[arg(long)]
        table: String,

        #[arg(long, help = "Print name, type and length as JSON")]
        describe: bool,
    },
}
