use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

fn pact(url: &str) -> anyhow::Result<Command> {
    let mut cmd = Command::cargo_bin("pact-cli")?;
    cmd.env(pact_db::ENV_DB_URL, url);
    Ok(cmd)
}

/// First `key=<i64>` on stdout.
fn id_from(stdout: &[u8], key: &str) -> anyhow::Result<i64> {
    let prefix = format!("{key}=");
    let line = String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with(&prefix))
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("no {key} in output"))?;
    let rest = &line[prefix.len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    Ok(digits.parse()?)
}

/// DB-backed: skipped if PACT_DATABASE_URL is not set.
#[test]
fn cli_drives_a_contract_to_locked() -> anyhow::Result<()> {
    let url = match std::env::var(pact_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: PACT_DATABASE_URL not set");
            return Ok(());
        }
    };

    pact(&url)?
        .args(["db", "migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("migrations_applied=true"));

    let mut bp_file = tempfile::NamedTempFile::new()?;
    bp_file.write_all(
        br#"{"name": "CLI NDA", "fields": [
            {"field_type": "text", "label": "Name", "position_x": 0, "position_y": 0},
            {"field_type": "signature", "label": "Sig", "position_x": 0, "position_y": 50}
        ]}"#,
    )?;

    let out = pact(&url)?
        .args(["blueprint", "create", "--file"])
        .arg(bp_file.path())
        .output()?;
    assert!(out.status.success());
    let bp_id = id_from(&out.stdout, "blueprint_id")?;

    let out = pact(&url)?
        .args(["contract", "create", "--blueprint-id", &bp_id.to_string(), "--name", "cli"])
        .output()?;
    assert!(out.status.success());
    let contract_id = id_from(&out.stdout, "contract_id")?;
    let sig_id = {
        let stdout = String::from_utf8_lossy(&out.stdout).to_string();
        let line = stdout
            .lines()
            .find(|l| l.contains("label=Sig"))
            .ok_or_else(|| anyhow::anyhow!("no Sig field"))?
            .to_string();
        id_from(line.as_bytes(), "field_id")?
    };
    let cid = contract_id.to_string();

    pact(&url)?
        .args(["contract", "transition", "--id", &cid, "--to", "SENT"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CREATED -> SENT"));

    pact(&url)?
        .args(["contract", "transition", "--id", &cid, "--to", "APPROVED"])
        .assert()
        .success();

    pact(&url)?
        .args([
            "contract",
            "set-field",
            "--id",
            &cid,
            "--field-id",
            &sig_id.to_string(),
            "--value",
            "J. Doe",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("value=J. Doe"));

    for to in ["SENT", "SIGNED", "LOCKED"] {
        pact(&url)?
            .args(["contract", "transition", "--id", &cid, "--to", to])
            .assert()
            .success();
    }

    pact(&url)?
        .args(["contract", "show", "--id", &cid])
        .assert()
        .success()
        .stdout(predicate::str::contains("status=LOCKED"))
        .stdout(predicate::str::contains("allowed_transitions=\n"))
        .stdout(predicate::str::contains("fields_editable=false"));

    // Referenced blueprint is protected.
    pact(&url)?
        .args(["blueprint", "delete", "--id", &bp_id.to_string()])
        .assert()
        .failure();

    Ok(())
}
