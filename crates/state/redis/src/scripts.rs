/// Lua script for acquiring a lease (SET NX PX).
///
/// KEYS\[1\] = lock key
/// ARGV\[1\] = holder token
/// ARGV\[2\] = TTL in milliseconds
///
/// Returns 1 if acquired, 0 otherwise.
pub const LEASE_ACQUIRE: &str = r"
local ok = redis.call('SET', KEYS[1], ARGV[1], 'NX', 'PX', ARGV[2])
if ok then
    return 1
end
return 0
";

/// Lua script for releasing a lease held by a given holder.
///
/// KEYS\[1\] = lock key
/// ARGV\[1\] = holder token
///
/// Returns 1 if released, 0 if the key is absent or held by someone else.
pub const LEASE_RELEASE: &str = r"
local holder = redis.call('GET', KEYS[1])
if holder == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

/// Lua script for extending a lease held by a given holder.
///
/// KEYS\[1\] = lock key
/// ARGV\[1\] = holder token
/// ARGV\[2\] = new TTL in milliseconds
///
/// Returns 1 if extended, 0 if the key is absent or held by someone else.
pub const LEASE_EXTEND: &str = r"
local holder = redis.call('GET', KEYS[1])
if holder == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
";
