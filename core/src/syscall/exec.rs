use alloc::vec::Vec;

use pebble_abi::error::ExecError;
use pebble_abi::param::{MAXARG, MAXPATH, PAGE_SIZE, USER_WORD};
use pebble_mm::VmError;

use super::context::SyscallContext;
use crate::exec::do_exec;

/// exec(path, argv): `argv` is a null-terminated array of string pointers.
pub fn sys_exec(ctx: &mut SyscallContext<'_>) -> i32 {
    match fetch_exec_args(ctx) {
        Ok((path, args)) => {
            let argv: Vec<&[u8]> = args.iter().map(Vec::as_slice).collect();
            match do_exec(ctx.kernel, ctx.proc, &path, &argv) {
                Ok(()) => 0,
                Err(err) => err.as_c_int(),
            }
        }
        Err(err) => err.as_c_int(),
    }
}

fn fetch_exec_args(ctx: &SyscallContext<'_>) -> Result<(Vec<u8>, Vec<Vec<u8>>), ExecError> {
    let path = match ctx.arg_str(0, MAXPATH) {
        Some(Ok(path)) => path,
        Some(Err(VmError::OutOfRange)) => return Err(ExecError::NameTooLong),
        Some(Err(_)) | None => return Err(ExecError::Fault),
    };
    let uargv = ctx.arg(1).ok_or(ExecError::Fault)?;

    let mut args = Vec::new();
    for i in 0u32.. {
        let slot = uargv
            .checked_add(i * USER_WORD)
            .ok_or(ExecError::Fault)?;
        let uarg = ctx.fetch_word(slot).ok_or(ExecError::Fault)?;
        if uarg == 0 {
            break;
        }
        if args.len() == MAXARG {
            return Err(ExecError::TooManyArgs);
        }
        let arg = ctx
            .fetch_str(uarg, PAGE_SIZE as usize)
            .map_err(|_| ExecError::Fault)?;
        args.push(arg);
    }
    Ok((path, args))
}
