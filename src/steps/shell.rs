//! Plain shell steps on the host

use playbook::{Outcome, Step, StepContext};

use super::Target;
use crate::remote::shell_quote;

fn quoted(paths: &[String]) -> String {
    paths
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| shell_quote(p))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `mkdir -p` every non-empty path
pub struct CreateDirectory {
    pub paths: Vec<String>,
}

impl Step<Target> for CreateDirectory {
    fn name(&self) -> &str {
        "create directory"
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        let paths = quoted(&self.paths);
        if paths.is_empty() {
            return Outcome::Done;
        }
        ctx.env().exec(&format!("mkdir -p {paths}")).map(drop).into()
    }
}

/// `rm -rf` every non-empty path
pub struct RemoveFiles {
    pub paths: Vec<String>,
}

impl Step<Target> for RemoveFiles {
    fn name(&self) -> &str {
        "remove files"
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        let paths = quoted(&self.paths);
        if paths.is_empty() {
            return Outcome::Done;
        }
        ctx.env().exec(&format!("rm -rf {paths}")).map(drop).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeRemote;
    use crate::steps::testing;
    use std::sync::Arc;

    #[test]
    fn test_skips_empty_paths() {
        let remote = Arc::new(FakeRemote::new());
        let target = testing::target(&remote);
        let mut ctx = StepContext::new(&target);

        let step = CreateDirectory {
            paths: vec!["/data/logs".into(), String::new(), "/data/my dir".into()],
        };
        assert!(step.execute(&mut ctx).is_done());

        let nothing = RemoveFiles {
            paths: vec![String::new()],
        };
        assert!(nothing.execute(&mut ctx).is_done());
        assert_eq!(remote.commands(), ["mkdir -p /data/logs '/data/my dir'"]);
    }
}
